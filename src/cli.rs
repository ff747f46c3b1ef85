//! CLI argument parsing for the okify workflow.
use crate::model::{Observatory, RunReference};
use clap::Parser;
use std::path::PathBuf;

/// Root CLI entrypoint.
///
/// A single positional pair names the CI run; everything else is a flag.
#[derive(Parser, Debug)]
#[command(
    name = "okify_regtests",
    version,
    about = "Review failed regression tests and replace their truth files",
    after_help = "Keys:\n  o  okify the shown test\n  s  skip it\n  q  quit (nothing after this test is touched)\n\nExamples:\n  okify_regtests jwst 956\n  okify_regtests roman 120 --dry-run\n  okify_regtests jwst 956 --dlpath /tmp/okify"
)]
pub struct RootArgs {
    /// Observatory whose regression tests ran
    #[arg(value_enum)]
    pub observatory: Observatory,

    /// CI run number to okify
    #[arg(value_name = "run-number")]
    pub run_number: u64,

    /// Walk every failure without changing anything remotely
    #[arg(long)]
    pub dry_run: bool,

    /// Existing directory to download artifacts into (kept afterwards)
    #[arg(long, value_name = "DIR", value_parser = existing_dir)]
    pub dlpath: Option<PathBuf>,
}

impl RootArgs {
    pub fn run_reference(&self) -> RunReference {
        RunReference {
            observatory: self.observatory,
            run_number: self.run_number,
        }
    }
}

fn existing_dir(raw: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(raw);
    if path.is_dir() {
        Ok(path)
    } else {
        Err(format!("{raw} is not an existing directory"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn parses_positionals_and_flags() {
        let dir = tempfile::tempdir().expect("temp dir");
        let dlpath = dir.path().display().to_string();
        let args = RootArgs::try_parse_from([
            "okify_regtests",
            "roman",
            "120",
            "--dry-run",
            "--dlpath",
            dlpath.as_str(),
        ])
        .expect("parse");
        assert_eq!(args.observatory, Observatory::Roman);
        assert_eq!(args.run_number, 120);
        assert!(args.dry_run);
        assert_eq!(args.dlpath.as_deref(), Some(dir.path()));
        assert_eq!(args.run_reference().to_string(), "roman run 120");
    }

    #[test]
    fn rejects_unknown_observatory_and_bad_run_number() {
        let err = RootArgs::try_parse_from(["okify_regtests", "hubble", "1"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
        let err = RootArgs::try_parse_from(["okify_regtests", "jwst", "-3"]).unwrap_err();
        assert!(matches!(
            err.kind(),
            ErrorKind::InvalidValue | ErrorKind::UnknownArgument
        ));
        let err = RootArgs::try_parse_from(["okify_regtests", "jwst"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn dlpath_must_exist() {
        let dir = tempfile::tempdir().expect("temp dir");
        let missing = dir.path().join("missing").display().to_string();
        let err = RootArgs::try_parse_from([
            "okify_regtests",
            "jwst",
            "956",
            "--dlpath",
            missing.as_str(),
        ])
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
    }
}
