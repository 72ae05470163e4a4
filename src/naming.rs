//! Stage output naming conventions.
//!
//! The engine writes every derived image next to its input and encodes the
//! producing stage in the file name: a single-character prefix for resliced
//! (`r`), warped (`w`) and smoothed (`s`) volumes, the `y_<stem>.nii` form
//! for deformation fields, and `<stem>_sn.mat` for saved normalization
//! transforms. Later stages rely on these derivations instead of engine
//! feedback, so the rules here are pure and deterministic: same input, same
//! output, directory always unchanged.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// The stage tag encoded in a derived file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageTag {
    Resliced,
    Warped,
    Smoothed,
    DeformationField,
    TransformMatrix,
}

impl StageTag {
    /// Derives the output path the engine will produce for `input` under
    /// this stage.
    pub fn derive(self, input: &Path) -> PathBuf {
        match self {
            StageTag::Resliced => prefixed(input, 'r'),
            StageTag::Warped => prefixed(input, 'w'),
            StageTag::Smoothed => prefixed(input, 's'),
            StageTag::DeformationField => deformation_field(input),
            StageTag::TransformMatrix => transform_matrix(input),
        }
    }

    /// Recovers the stage tag from a derived file name, if any.
    ///
    /// The special forms are checked before the single-character prefixes so
    /// that `y_T1.nii` is a deformation field, not an unknown name.
    pub fn detect(path: &Path) -> Option<StageTag> {
        let name = path.file_name().and_then(OsStr::to_str)?;
        if name.ends_with("_sn.mat") {
            return Some(StageTag::TransformMatrix);
        }
        if name.starts_with("y_") {
            return Some(StageTag::DeformationField);
        }
        match name.chars().next()? {
            'r' => Some(StageTag::Resliced),
            'w' => Some(StageTag::Warped),
            's' => Some(StageTag::Smoothed),
            _ => None,
        }
    }
}

fn split(input: &Path) -> (&Path, &str) {
    let dir = input.parent().unwrap_or_else(|| Path::new(""));
    let name = input
        .file_name()
        .and_then(OsStr::to_str)
        .unwrap_or_default();
    (dir, name)
}

/// Prepends a stage prefix to the basename, directory unchanged.
pub fn prefixed(input: &Path, prefix: char) -> PathBuf {
    let (dir, name) = split(input);
    dir.join(format!("{prefix}{name}"))
}

/// The deformation-field artifact written by MRI normalization:
/// `y_<stem>.nii` beside the input.
pub fn deformation_field(input: &Path) -> PathBuf {
    let (dir, _) = split(input);
    let stem = input
        .file_stem()
        .and_then(OsStr::to_str)
        .unwrap_or_default();
    dir.join(format!("y_{stem}.nii"))
}

/// The saved-transform artifact written by PET normalization:
/// `<stem>_sn.mat` beside the input.
pub fn transform_matrix(input: &Path) -> PathBuf {
    let (dir, _) = split(input);
    let stem = input
        .file_stem()
        .and_then(OsStr::to_str)
        .unwrap_or_default();
    dir.join(format!("{stem}_sn.mat"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_rules_keep_directory() {
        assert_eq!(
            StageTag::Resliced.derive(Path::new("/data/s01/PET.nii")),
            PathBuf::from("/data/s01/rPET.nii")
        );
        assert_eq!(
            StageTag::Warped.derive(Path::new("/data/s01/T1.nii")),
            PathBuf::from("/data/s01/wT1.nii")
        );
        assert_eq!(
            StageTag::Smoothed.derive(Path::new("/data/s01/wT1.nii")),
            PathBuf::from("/data/s01/swT1.nii")
        );
    }

    #[test]
    fn smoothing_stacks_on_existing_prefixes() {
        // The rule is purely textual: already-prefixed names get another
        // prefix, and resolving the same stage twice is deterministic.
        let once = StageTag::Smoothed.derive(Path::new("wT1.nii"));
        assert_eq!(once, PathBuf::from("swT1.nii"));
        assert_eq!(StageTag::Smoothed.derive(Path::new("wT1.nii")), once);
    }

    #[test]
    fn special_forms_replace_extension() {
        assert_eq!(
            deformation_field(Path::new("/d/T1.nii")),
            PathBuf::from("/d/y_T1.nii")
        );
        assert_eq!(
            transform_matrix(Path::new("/d/PET.nii")),
            PathBuf::from("/d/PET_sn.mat")
        );
    }

    #[test]
    fn trailing_separator_is_tolerated() {
        assert_eq!(
            prefixed(Path::new("/d/T1.nii/"), 'w'),
            PathBuf::from("/d/wT1.nii")
        );
    }

    #[test]
    fn detect_round_trips_every_stage() {
        for tag in [
            StageTag::Resliced,
            StageTag::Warped,
            StageTag::Smoothed,
            StageTag::DeformationField,
            StageTag::TransformMatrix,
        ] {
            let derived = tag.derive(Path::new("/d/T1.nii"));
            assert_eq!(StageTag::detect(&derived), Some(tag), "{derived:?}");
        }
    }

    #[test]
    fn detect_ignores_unprefixed_names() {
        assert_eq!(StageTag::detect(Path::new("/d/T1.nii")), None);
    }
}
