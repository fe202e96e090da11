//! What a batch verifies
//!
//! A batch is either an explicit, ordered list of files or one or more
//! folders walked recursively. Folder walks are lazy so a batch of hundreds
//! of thousands of files never materialises its file list.

use crate::core::error::{Result, VerifyError};
use crate::fixity::FileError;
use log::warn;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Root folders named in a report file name before the rest are summarised
const LABEL_FOLDER_LIMIT: usize = 2;

/// The files a batch should verify
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSpec {
    /// Exactly these files, in this order
    Files(Vec<PathBuf>),
    /// Every regular file under these folders
    Directories(Vec<PathBuf>),
}

impl InputSpec {
    /// Classify user-supplied paths
    ///
    /// All paths must exist and must be either all files or all folders.
    pub fn from_paths(paths: Vec<PathBuf>) -> Result<Self> {
        if paths.is_empty() {
            return Err(VerifyError::InvalidInput(
                "no files or folders were given".to_string(),
            ));
        }

        if let Some(missing) = paths.iter().find(|p| !p.exists()) {
            return Err(VerifyError::InvalidInput(format!(
                "'{}' does not exist",
                missing.display()
            )));
        }

        let folders = paths.iter().filter(|p| p.is_dir()).count();
        if folders == paths.len() {
            Ok(InputSpec::Directories(paths))
        } else if folders == 0 {
            Ok(InputSpec::Files(paths))
        } else {
            Err(VerifyError::InvalidInput(
                "select either files or folders, not both".to_string(),
            ))
        }
    }

    /// Whether this batch walks folders
    pub fn is_directories(&self) -> bool {
        matches!(self, InputSpec::Directories(_))
    }

    /// The paths exactly as given
    pub fn paths(&self) -> &[PathBuf] {
        match self {
            InputSpec::Files(paths) | InputSpec::Directories(paths) => paths,
        }
    }

    /// Short description of the input for the report file name
    ///
    /// Folders: the first two folder names joined by `_AND_`, followed by
    /// `_AND_<n>_more_folder(s)` when there are more. Files: the name of
    /// the folder holding the first file.
    pub fn report_label(&self) -> String {
        match self {
            InputSpec::Directories(roots) => {
                let names: Vec<String> = roots
                    .iter()
                    .take(LABEL_FOLDER_LIMIT)
                    .map(|root| display_name(root))
                    .collect();
                let mut label = names.join("_AND_");

                let more = roots.len().saturating_sub(LABEL_FOLDER_LIMIT);
                if more > 0 {
                    label.push_str(&format!(
                        "_AND_{}_more_folder{}",
                        more,
                        if more > 1 { "s" } else { "" }
                    ));
                }
                label
            }
            InputSpec::Files(files) => files
                .first()
                .and_then(|f| f.parent())
                .map(display_name)
                .unwrap_or_default(),
        }
    }

    /// Iterate the files to verify, in processing order
    ///
    /// Folder walks yield every regular file below each root exactly once
    /// (sorted by name within a folder) and skip folder entries. Symbolic
    /// links to regular files are listed even when links are not followed.
    /// Entries the walk cannot read, dangling links and links to folders
    /// that are not followed come back as `Err` so they can be logged.
    pub fn files(
        &self,
        follow_symlinks: bool,
    ) -> Box<dyn Iterator<Item = std::result::Result<PathBuf, FileError>> + '_> {
        match self {
            InputSpec::Files(files) => Box::new(files.iter().cloned().map(Ok)),
            InputSpec::Directories(roots) => Box::new(roots.iter().flat_map(move |root| {
                WalkDir::new(root)
                    .follow_links(follow_symlinks)
                    .sort_by_file_name()
                    .into_iter()
                    .filter_map(move |entry| match entry {
                        Ok(entry) if entry.file_type().is_file() => Some(Ok(entry.into_path())),
                        Ok(entry) if entry.path_is_symlink() => linked_file(entry.into_path()),
                        Ok(_) => None,
                        Err(e) => {
                            let path = e.path().unwrap_or(root.as_path()).to_path_buf();
                            warn!("Could not read {}: {}", path.display(), e);
                            Some(Err(FileError::new(path, e.to_string())))
                        }
                    })
            })),
        }
    }
}

/// A symbolic link the walk did not follow
///
/// `Path::is_file` resolves the link, so a link to a regular file is hashed
/// like the file itself. Anything else is reported rather than dropped.
fn linked_file(path: PathBuf) -> Option<std::result::Result<PathBuf, FileError>> {
    if path.is_file() {
        return Some(Ok(path));
    }

    let reason = if path.is_dir() {
        "symbolic link to a folder was not followed"
    } else {
        "symbolic link does not point to an existing file"
    };
    warn!("Skipping {}: {}", path.display(), reason);
    Some(Err(FileError::new(path, reason)))
}

/// Last path component, or the whole path for roots like "/"
fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}
