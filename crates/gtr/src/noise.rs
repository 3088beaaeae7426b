//! Stripping non-deterministic log lines out of toolchain output.
//!
//! The toolchain's internal logger prints lines carrying timestamps, so they differ on every run.  Any line containing
//! one of the configured markers is removed.  Output is treated as bytes since nothing guarantees the toolchain prints
//! UTF-8 (the emulator in particular doesn't).
use regex::bytes::Regex;

#[derive(Clone, Debug)]
pub struct NoiseFilter {
    /// Alternation of all the escaped markers.  `None` if there are no markers, in which case filtering is a no-op.
    matcher: Option<Regex>,
}

impl NoiseFilter {
    pub fn new<S: AsRef<str>>(markers: &[S]) -> NoiseFilter {
        let alternatives = markers
            .iter()
            .map(|m| m.as_ref())
            .filter(|m| !m.is_empty())
            .map(regex::escape)
            .collect::<Vec<_>>();

        if alternatives.is_empty() {
            return NoiseFilter { matcher: None };
        }

        let matcher = Regex::new(&alternatives.join("|"))
            .expect("A regex made only of escaped literals always compiles");
        NoiseFilter {
            matcher: Some(matcher),
        }
    }

    /// Remove every line containing a marker.
    ///
    /// Lines keep their terminators, so what's left is still a well-formed text file.  A final line with no terminator
    /// is a line like any other.
    pub fn strip(&self, input: &[u8]) -> Vec<u8> {
        let Some(matcher) = self.matcher.as_ref() else {
            return input.to_vec();
        };

        let mut out = Vec::with_capacity(input.len());
        for line in input.split_inclusive(|b| *b == b'\n') {
            if !matcher.is_match(line) {
                out.extend_from_slice(line);
            }
        }
        out
    }
}
