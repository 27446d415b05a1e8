//! Chart archive (`.tgz`) packing and extraction
//!
//! Repository archives hold a single top-level directory named after the
//! chart (`<name>/Chart.yaml`, `<name>/templates/...`).

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tar::{Archive, Builder};

use crate::chart::ChartMetadata;
use crate::error::{CoreError, Result};

/// Unpack a gzipped chart archive into `dest` and return the chart root
pub fn extract_chart_archive(data: &[u8], dest: &Path) -> Result<PathBuf> {
    let gz = GzDecoder::new(Cursor::new(data));
    let mut archive = Archive::new(gz);

    std::fs::create_dir_all(dest)?;
    archive.unpack(dest).map_err(|e| CoreError::Archive {
        message: format!("failed to unpack chart archive: {}", e),
    })?;

    let root = find_chart_root(dest)?;
    expand_subchart_archives(&root.join("charts"))?;
    Ok(root)
}

/// Locate the directory holding `Chart.yaml` inside an unpacked archive
///
/// Either `dir` itself or exactly one of its immediate subdirectories.
pub fn find_chart_root(dir: &Path) -> Result<PathBuf> {
    if dir.join("Chart.yaml").is_file() {
        return Ok(dir.to_path_buf());
    }

    let candidates: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir() && p.join("Chart.yaml").is_file())
        .collect();

    match candidates.as_slice() {
        [root] => Ok(root.clone()),
        [] => Err(CoreError::Archive {
            message: format!("no Chart.yaml found in {}", dir.display()),
        }),
        _ => Err(CoreError::Archive {
            message: format!("multiple charts found in {}", dir.display()),
        }),
    }
}

/// Replace every `charts/*.tgz` with its unpacked directory, recursively
///
/// The unpacked directory is named after the chart. An archive whose chart
/// directory already exists is removed without unpacking.
pub fn expand_subchart_archives(charts_dir: &Path) -> Result<()> {
    if !charts_dir.is_dir() {
        return Ok(());
    }

    let mut archives: Vec<PathBuf> = std::fs::read_dir(charts_dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "tgz"))
        .collect();
    archives.sort();

    for archive_path in archives {
        let stem = archive_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let staging = charts_dir.join(format!(".unpack-{}", stem));
        if staging.exists() {
            std::fs::remove_dir_all(&staging)?;
        }

        let data = std::fs::read(&archive_path)?;
        let root = extract_chart_archive(&data, &staging)?;
        let chart_yaml = std::fs::read_to_string(root.join("Chart.yaml"))?;
        let metadata = ChartMetadata::from_yaml(&chart_yaml)?;

        let target = charts_dir.join(&metadata.name);
        if target.exists() {
            tracing::debug!(chart = %metadata.name, "subchart already unpacked, skipping archive");
        } else {
            std::fs::rename(&root, &target)?;
            tracing::debug!(
                chart = %metadata.name,
                path = %target.display(),
                "unpacked subchart archive"
            );
        }

        std::fs::remove_dir_all(&staging)?;
        std::fs::remove_file(&archive_path)?;
    }

    Ok(())
}

/// Pack a chart directory into a gzipped tarball under a `<name>/` prefix
pub fn package_chart(root: &Path) -> Result<Vec<u8>> {
    let metadata = ChartMetadata::from_yaml(&std::fs::read_to_string(root.join("Chart.yaml"))?)?;

    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = Builder::new(encoder);
    builder.mode(tar::HeaderMode::Deterministic);
    builder.append_dir_all(&metadata.name, root)?;

    let encoder = builder.into_inner()?;
    Ok(encoder.finish()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::LoadedChart;

    fn create_test_chart(dir: &Path, name: &str) {
        std::fs::create_dir_all(dir.join("templates")).unwrap();
        std::fs::write(
            dir.join("Chart.yaml"),
            format!("apiVersion: v2\nname: {}\nversion: 0.1.0\n", name),
        )
        .unwrap();
        std::fs::write(dir.join("values.yaml"), "replicas: 1\n").unwrap();
        std::fs::write(dir.join("templates/cm.yaml"), "kind: ConfigMap\n").unwrap();
    }

    #[test]
    fn test_package_and_extract() {
        let src = tempfile::tempdir().unwrap();
        create_test_chart(src.path(), "demo");

        let data = package_chart(src.path()).unwrap();

        let dest = tempfile::tempdir().unwrap();
        let root = extract_chart_archive(&data, dest.path()).unwrap();

        assert_eq!(root, dest.path().join("demo"));
        let chart = LoadedChart::load(&root).unwrap();
        assert_eq!(chart.name(), "demo");
        assert_eq!(chart.template_files().unwrap().len(), 1);
    }

    #[test]
    fn test_nested_subchart_archives_are_expanded() {
        let sub = tempfile::tempdir().unwrap();
        create_test_chart(sub.path(), "redis");
        let sub_data = package_chart(sub.path()).unwrap();

        let parent = tempfile::tempdir().unwrap();
        create_test_chart(parent.path(), "app");
        std::fs::create_dir_all(parent.path().join("charts")).unwrap();
        std::fs::write(parent.path().join("charts/redis-0.1.0.tgz"), sub_data).unwrap();
        let data = package_chart(parent.path()).unwrap();

        let dest = tempfile::tempdir().unwrap();
        let root = extract_chart_archive(&data, dest.path()).unwrap();

        assert!(root.join("charts/redis/Chart.yaml").is_file());
        assert!(!root.join("charts/redis-0.1.0.tgz").exists());
        let subcharts = LoadedChart::load(&root).unwrap().subcharts().unwrap();
        assert_eq!(subcharts.len(), 1);
    }

    #[test]
    fn test_garbage_is_rejected() {
        let dest = tempfile::tempdir().unwrap();
        let err = extract_chart_archive(b"not a tarball", dest.path()).unwrap_err();
        assert!(matches!(err, CoreError::Archive { .. }));
    }

    #[test]
    fn test_find_chart_root_requires_chart_yaml() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("empty")).unwrap();
        assert!(find_chart_root(dir.path()).is_err());
    }
}
