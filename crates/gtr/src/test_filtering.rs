use regex::bytes as regex;

use crate::error::Result;

/// Given a string representing a glob pattern, return a regular expression which can match it.
fn compile_glob(glob: &str) -> Result<regex::Regex> {
    let parsed_glob = globset::Glob::new(glob)?;
    let r = parsed_glob.regex();
    Ok(regex::Regex::new(r).expect("globset always produces a valid regex"))
}

/// Decides which directory entries count as fixtures.
///
/// Entries whose file name contains an ignore marker (`.gitignore` and friends) are never fixtures.  If a pattern was
/// given on the command line, the fixture name must also match it.
#[derive(Clone, Debug, Default)]
pub struct FixtureFilter {
    ignore_markers: Vec<String>,
    pattern: Option<regex::Regex>,
}

impl FixtureFilter {
    pub fn new(ignore_markers: Vec<String>, pattern: Option<&str>) -> Result<FixtureFilter> {
        Ok(FixtureFilter {
            ignore_markers,
            pattern: pattern.map(compile_glob).transpose()?,
        })
    }

    pub fn is_ignored(&self, file_name: &str) -> bool {
        self.ignore_markers
            .iter()
            .any(|m| file_name.contains(m.as_str()))
    }

    /// Does the fixture name, without extension, pass the pattern?
    pub fn matches_name(&self, fixture_name: &str) -> bool {
        self.pattern
            .as_ref()
            .map(|g| g.is_match(fixture_name.as_bytes()))
            .unwrap_or(true)
    }
}
