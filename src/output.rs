// Persists a ScrapeResult the way the CLI caller wants it on disk
use crate::model::ScrapeResult;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("failed to write output: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode result: {0}")]
    Json(#[from] serde_json::Error),
}

/// Writes `<dir>/data.json` and `<dir>/images/<index><ext>`. Returns the written image paths.
pub fn save_result(result: &ScrapeResult, dir: &Path) -> Result<Vec<PathBuf>, OutputError> {
    let images_dir = dir.join("images");
    fs::create_dir_all(&images_dir)?;

    let mut written = Vec::with_capacity(result.images.len());
    for (index, image) in result.images.iter().enumerate() {
        let path = images_dir.join(format!("{}{}", index, image.extension));
        fs::write(&path, &image.content)?;
        written.push(path);
    }

    let json = serde_json::to_vec_pretty(result)?;
    fs::write(dir.join("data.json"), json)?;

    info!("Saved result and {} image(s) to {}", written.len(), dir.display());
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ImageAsset, MenuItem, SortMode};
    use chrono::Utc;

    #[test]
    fn writes_json_and_numbered_images() {
        let dir = tempfile::tempdir().unwrap();
        let result = ScrapeResult {
            url: "https://www.yelp.com/biz/x".into(),
            business_name: "X".into(),
            location: "Somewhere".into(),
            rating: None,
            review_count: Some(3),
            categories: vec![],
            menu_items: vec![MenuItem {
                name: "Burrito".into(),
                price: Some("$9.50".into()),
                description: None,
            }],
            sort_mode: SortMode::Newest,
            fetched_at: Utc::now(),
            images: vec![
                ImageAsset { source_url: "a".into(), content: vec![1], extension: ".jpg".into() },
                ImageAsset { source_url: "b".into(), content: vec![2, 2], extension: ".bin".into() },
            ],
        };

        let written = save_result(&result, dir.path()).unwrap();
        assert_eq!(written, vec![dir.path().join("images/0.jpg"), dir.path().join("images/1.bin")]);
        assert_eq!(fs::read(&written[1]).unwrap(), vec![2, 2]);

        let json: serde_json::Value =
            serde_json::from_slice(&fs::read(dir.path().join("data.json")).unwrap()).unwrap();
        assert_eq!(json["business_name"], "X");
        assert_eq!(json["sort_mode"], "newest");
        assert!(json["rating"].is_null());
        assert_eq!(json["images"][1]["source_url"], "b");
        assert_eq!(json["menu_items"][0]["price"], "$9.50");
    }
}
