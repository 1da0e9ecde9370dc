//! Case archiving: streaming tar inside a zstd frame.

use std::fs::{self, File};
use std::path::Path;

use tracing::debug;

use crate::{ReportError, Result};

/// Archives every regular file in `case_dir` into `case_dir/<name>`.
///
/// The archive is written to a `.tmp` sibling and renamed into place; on
/// any error the partial file is removed. Entry names are the files'
/// forward-slash-relative paths inside the case directory.
pub fn write_archive(case_dir: &Path, name: &str) -> Result<()> {
    let final_path = case_dir.join(name);
    let tmp_path = case_dir.join(format!("{name}.tmp"));

    let result = build(case_dir, &tmp_path, name);
    if let Err(e) = result {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }

    fs::rename(&tmp_path, &final_path)
        .map_err(ReportError::io(final_path.display().to_string()))?;
    debug!(archive = %final_path.display(), "case archive written");
    Ok(())
}

fn build(case_dir: &Path, tmp_path: &Path, archive_name: &str) -> Result<()> {
    let file = File::create(tmp_path).map_err(ReportError::io(tmp_path.display().to_string()))?;
    let encoder = zstd::Encoder::new(file, 0)
        .map_err(ReportError::io(tmp_path.display().to_string()))?;
    let mut builder = tar::Builder::new(encoder);

    let mut entries: Vec<_> = fs::read_dir(case_dir)
        .map_err(ReportError::io(case_dir.display().to_string()))?
        .collect::<std::io::Result<_>>()
        .map_err(ReportError::io(case_dir.display().to_string()))?;
    entries.sort_by_key(std::fs::DirEntry::file_name);

    for entry in entries {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let file_name = entry.file_name();
        let relative = file_name.to_string_lossy();
        // Skip the archive itself and any leftover temp file.
        if relative == archive_name || relative.ends_with(".tmp") {
            continue;
        }
        let entry_name = relative.replace('\\', "/");
        let mut source =
            File::open(&path).map_err(ReportError::io(path.display().to_string()))?;
        builder
            .append_file(Path::new(&entry_name), &mut source)
            .map_err(ReportError::io(path.display().to_string()))?;
    }

    let encoder = builder
        .into_inner()
        .map_err(ReportError::io(tmp_path.display().to_string()))?;
    encoder
        .finish()
        .map_err(ReportError::io(tmp_path.display().to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn archive_round_trips_through_tar_and_zstd() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("summary.json"), b"{}\n").unwrap();
        fs::write(dir.path().join("case.sql"), b"SELECT 1;\n").unwrap();

        write_archive(dir.path(), "case.tar.zst").unwrap();

        let archive = File::open(dir.path().join("case.tar.zst")).unwrap();
        let decoder = zstd::Decoder::new(archive).unwrap();
        let mut tar = tar::Archive::new(decoder);

        let mut names = Vec::new();
        for entry in tar.entries().unwrap() {
            let mut entry = entry.unwrap();
            let name = entry.path().unwrap().display().to_string();
            if name == "case.sql" {
                let mut content = String::new();
                entry.read_to_string(&mut content).unwrap();
                assert_eq!(content, "SELECT 1;\n");
            }
            names.push(name);
        }
        names.sort();
        assert_eq!(names, vec!["case.sql", "summary.json"]);
    }

    #[test]
    fn no_tmp_file_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("summary.json"), b"{}\n").unwrap();
        write_archive(dir.path(), "case.tar.zst").unwrap();
        assert!(!dir.path().join("case.tar.zst.tmp").exists());
        assert!(dir.path().join("case.tar.zst").exists());
    }

    #[test]
    fn archive_excludes_itself_on_rewrite() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("summary.json"), b"{}\n").unwrap();
        write_archive(dir.path(), "case.tar.zst").unwrap();
        // A second archive pass must not swallow the first archive.
        write_archive(dir.path(), "case.tar.zst").unwrap();

        let archive = File::open(dir.path().join("case.tar.zst")).unwrap();
        let decoder = zstd::Decoder::new(archive).unwrap();
        let mut tar = tar::Archive::new(decoder);
        let names: Vec<String> = tar
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().display().to_string())
            .collect();
        assert_eq!(names, vec!["summary.json"]);
    }
}
