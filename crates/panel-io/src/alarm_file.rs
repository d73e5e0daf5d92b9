//! ALARM1 register exposed as a text file (sysfs attribute or a file kept
//! up to date by another daemon).

use panel_core::{FanController, FanError};
use std::fs;
use std::path::{Path, PathBuf};

pub struct FileAlarmRegister {
    path: PathBuf,
}

impl FileAlarmRegister {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Accepts decimal, `0x` hex or `0b` binary.
pub fn parse_register(text: &str) -> Result<u8, FanError> {
    let value = text.trim();
    let parsed = if let Some(hex) = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        u8::from_str_radix(hex, 16)
    } else if let Some(bin) = value.strip_prefix("0b") {
        u8::from_str_radix(bin, 2)
    } else {
        value.parse::<u8>()
    };
    parsed.map_err(|_| FanError::Parse(value.to_string()))
}

impl FanController for FileAlarmRegister {
    fn alarm1(&mut self) -> Result<u8, FanError> {
        let text = fs::read_to_string(&self.path).map_err(FanError::Read)?;
        parse_register(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_register_formats() {
        assert_eq!(parse_register("0\n").unwrap(), 0);
        assert_eq!(parse_register("128").unwrap(), 0x80);
        assert_eq!(parse_register(" 0x3e ").unwrap(), 0x3E);
        assert_eq!(parse_register("0b01000000").unwrap(), 0x40);
        assert!(matches!(parse_register("256"), Err(FanError::Parse(_))));
        assert!(matches!(parse_register(""), Err(FanError::Parse(_))));
    }

    #[test]
    fn reads_current_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alarm1");
        fs::write(&path, "0x00\n").unwrap();

        let mut register = FileAlarmRegister::new(&path);
        assert_eq!(register.path(), path.as_path());
        assert_eq!(register.alarm1().unwrap(), 0);

        fs::write(&path, "0x80\n").unwrap();
        assert_eq!(register.alarm1().unwrap(), 0x80);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut register = FileAlarmRegister::new(dir.path().join("absent"));
        assert!(matches!(register.alarm1(), Err(FanError::Read(_))));
    }
}
