//! Entry name rules.

use std::collections::HashSet;

use drive_core::error::AppError;
use drive_core::result::AppResult;

/// Check that `name` can be stored as an entry name.
pub fn validate_name(name: &str, max_length: usize) -> AppResult<()> {
    if name.trim().is_empty() {
        return Err(AppError::validation("Name cannot be empty"));
    }
    if name == "." || name == ".." {
        return Err(AppError::validation(format!("'{name}' is not a valid name")));
    }
    if name.contains('/') || name.contains('\0') {
        return Err(AppError::validation(format!(
            "Name '{name}' contains a forbidden character"
        )));
    }
    if name.chars().count() > max_length {
        return Err(AppError::validation(format!(
            "Name is longer than {max_length} characters"
        )));
    }
    Ok(())
}

/// Return `name`, or the first `"stem (n).ext"` variant not in `taken`.
pub fn disambiguate(name: &str, is_directory: bool, taken: &HashSet<String>) -> String {
    if !taken.contains(name) {
        return name.to_string();
    }

    let (stem, extension) = match name.rfind('.') {
        Some(dot) if dot > 0 && !is_directory => name.split_at(dot),
        _ => (name, ""),
    };

    let mut n = 1u32;
    loop {
        let candidate = format!("{stem} ({n}){extension}");
        if !taken.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name() {
        assert!(validate_name("report.pdf", 255).is_ok());
        assert!(validate_name("", 255).is_err());
        assert!(validate_name("   ", 255).is_err());
        assert!(validate_name("..", 255).is_err());
        assert!(validate_name("a/b", 255).is_err());
        assert!(validate_name(&"x".repeat(256), 255).is_err());
        assert!(validate_name(&"é".repeat(255), 255).is_ok());
    }

    #[test]
    fn test_disambiguate() {
        let taken: HashSet<String> = ["report.pdf", "report (1).pdf", "photos", ".env"]
            .into_iter()
            .map(String::from)
            .collect();

        assert_eq!(disambiguate("notes.txt", false, &taken), "notes.txt");
        assert_eq!(disambiguate("report.pdf", false, &taken), "report (2).pdf");
        assert_eq!(disambiguate("photos", true, &taken), "photos (1)");
        assert_eq!(disambiguate(".env", false, &taken), ".env (1)");
    }
}
