use std::{fs, io};
use std::path::{Path, PathBuf};

/// Job request files to submit: the path itself, or every `.json` file in it if it's a directory
pub fn get_message_paths(path: &Path) -> Result<Vec<PathBuf>, io::Error> {
    if !path.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }
    let mut paths = fs::read_dir(path)?
        .map(|res| res.map(|e| e.path()))
        .collect::<Result<Vec<PathBuf>, io::Error>>()?;
    paths.retain(|p| p.extension().map_or(false, |ext| ext == "json"));
    paths.sort();
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_lists_json_files_in_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.json"), "{}").unwrap();
        fs::write(dir.path().join("a.json"), "{}").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();
        let paths = get_message_paths(dir.path()).unwrap();
        assert_eq!(paths, vec![dir.path().join("a.json"), dir.path().join("b.json")]);
    }

    #[test]
    fn single_file_is_returned_as_is() {
        let path = Path::new("request.json");
        assert_eq!(get_message_paths(path).unwrap(), vec![path.to_path_buf()]);
    }
}
