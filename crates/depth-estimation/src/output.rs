//! Writing predictions to disk: `.npy` arrays and colormapped JPEGs

use crate::colormap::colorize;
use crate::postprocess::{disp_to_depth, metric_depth};
use crate::DepthError;
use monodepth_common::DisparityMap;
use monodepth_core::image_io::save_rgb_jpeg;
use ndarray::Array2;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy)]
pub struct OutputOptions {
    pub min_depth: f32,
    pub max_depth: f32,
    /// Save `STEREO_SCALE_FACTOR * depth` instead of the scaled disparity
    pub metric_depth: bool,
    pub jpeg_quality: u8,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            min_depth: 0.1,
            max_depth: 100.0,
            metric_depth: false,
            jpeg_quality: 90,
        }
    }
}

/// Files written for one prediction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SavedOutputs {
    pub npy: PathBuf,
    pub colormap: PathBuf,
}

/// Write `<stem>_disp.npy` (or `<stem>_depth.npy` for metric depth) and
/// `<stem>_disp.jpeg` into `dir`
pub fn save_outputs(
    dir: &Path,
    stem: &str,
    disp: &DisparityMap,
    options: &OutputOptions,
) -> Result<SavedOutputs, DepthError> {
    std::fs::create_dir_all(dir).map_err(|source| DepthError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let (npy, array) = if options.metric_depth {
        (
            dir.join(format!("{stem}_depth.npy")),
            metric_depth(disp, options.min_depth, options.max_depth),
        )
    } else {
        let (scaled_disp, _) = disp_to_depth(disp, options.min_depth, options.max_depth);
        (dir.join(format!("{stem}_disp.npy")), scaled_disp)
    };
    write_array(&npy, &array)?;

    let colormap = dir.join(format!("{stem}_disp.jpeg"));
    save_rgb_jpeg(&colorize(disp), &colormap, options.jpeg_quality)?;

    Ok(SavedOutputs { npy, colormap })
}

fn write_array(path: &Path, array: &Array2<f32>) -> Result<(), DepthError> {
    ndarray_npy::write_npy(path, array).map_err(|source| DepthError::WriteNpy {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray_npy::read_npy;

    #[test]
    fn test_save_outputs_writes_disparity_and_colormap() {
        let dir = tempfile::tempdir().unwrap();
        let disp = DisparityMap::new(4, 2, vec![0.0, 0.25, 0.5, 1.0, 0.0, 0.25, 0.5, 1.0]).unwrap();

        let saved = save_outputs(dir.path(), "frame", &disp, &OutputOptions::default()).unwrap();
        assert_eq!(saved.npy, dir.path().join("frame_disp.npy"));
        assert_eq!(saved.colormap, dir.path().join("frame_disp.jpeg"));

        let array: Array2<f32> = read_npy(&saved.npy).unwrap();
        assert_eq!(array.dim(), (2, 4));
        assert!((array[[0, 0]] - 0.01).abs() < 1e-6);
        assert!((array[[1, 3]] - 10.0).abs() < 1e-4);

        let img = image::open(&saved.colormap).unwrap();
        assert_eq!((img.width(), img.height()), (4, 2));
    }

    #[test]
    fn test_save_outputs_metric_depth() {
        let dir = tempfile::tempdir().unwrap();
        let disp = DisparityMap::new(2, 1, vec![0.0, 1.0]).unwrap();
        let options = OutputOptions {
            metric_depth: true,
            ..OutputOptions::default()
        };

        let saved = save_outputs(&dir.path().join("out"), "img", &disp, &options).unwrap();
        assert_eq!(saved.npy, dir.path().join("out/img_depth.npy"));

        let array: Array2<f32> = read_npy(&saved.npy).unwrap();
        assert!((array[[0, 1]] - 0.54).abs() < 1e-4);
    }

    #[test]
    fn test_unwritable_directory_keeps_io_source() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("taken");
        std::fs::write(&blocker, b"file, not a directory").unwrap();
        let disp = DisparityMap::new(1, 1, vec![0.5]).unwrap();

        let err = save_outputs(&blocker.join("out"), "img", &disp, &OutputOptions::default())
            .unwrap_err();
        assert!(matches!(err, DepthError::CreateDir { ref path, .. } if *path == blocker.join("out")));

        let source = std::error::Error::source(&err).unwrap();
        assert!(source.downcast_ref::<std::io::Error>().is_some());
    }

    #[test]
    fn test_npy_write_failure_keeps_source() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the .npy file should go makes the write fail
        std::fs::create_dir(dir.path().join("img_disp.npy")).unwrap();
        let disp = DisparityMap::new(1, 1, vec![0.5]).unwrap();

        let err = save_outputs(dir.path(), "img", &disp, &OutputOptions::default()).unwrap_err();
        assert!(matches!(err, DepthError::WriteNpy { .. }));
        let source = std::error::Error::source(&err).unwrap();
        assert!(source.downcast_ref::<ndarray_npy::WriteNpyError>().is_some());
    }
}
