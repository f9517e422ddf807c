//! Drive the pandoc runner with shell scripts standing in for pandoc.
#![cfg(unix)]

mod common;

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use assert_fs::prelude::*;
use assert_fs::TempDir;

use nsx2md::config::ConverterConfig;
use nsx2md::converter::pandoc::{detect_version, Pandoc, ToolVersion};
use nsx2md::converter::TextConverter;
use nsx2md::error::NsxError;
use nsx2md::export::archive::ArchiveConverter;

use common::{bare_config, note, ArchiveBuilder};

/// Copies the input file (last argument) to the `-o` target.
const COPYING_PANDOC: &str = r#"#!/bin/sh
if [ "$1" = "-v" ]; then
  echo "pandoc 2.19.2"
  exit 0
fi
out=""
while [ $# -gt 1 ]; do
  if [ "$1" = "-o" ]; then out="$2"; fi
  shift
done
cat "$1" > "$out"
"#;

/// Writes 200 KB to stderr before doing the copying script's job.
const NOISY_PANDOC: &str = r#"#!/bin/sh
head -c 200000 /dev/zero | tr '\000' 'x' >&2
out=""
while [ $# -gt 1 ]; do
  if [ "$1" = "-o" ]; then out="$2"; fi
  shift
done
cat "$1" > "$out"
"#;

const FAILING_PANDOC: &str = "#!/bin/sh\necho 'unknown reader' >&2\nexit 3\n";

const SLOW_PANDOC: &str = "#!/bin/sh\nsleep 10\n";

fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

// Scripts are written and executed from one test so no other thread forks
// while a script file is still open for writing.
#[test]
fn test_pandoc_runner_with_scripts() {
    let tmp = TempDir::new().unwrap();
    let copying = script(tmp.path(), "pandoc-copy", COPYING_PANDOC);
    let failing = script(tmp.path(), "pandoc-fail", FAILING_PANDOC);
    let slow = script(tmp.path(), "pandoc-slow", SLOW_PANDOC);
    let noisy = script(tmp.path(), "pandoc-noisy", NOISY_PANDOC);

    // Version detection
    assert_eq!(detect_version(&copying), Some(ToolVersion::new(&[2, 19, 2])));
    assert_eq!(detect_version(&failing), None);

    let config = ConverterConfig {
        program: Some(copying.clone()),
        timeout_secs: 5,
    };
    let mut pandoc = Pandoc::from_config(&config).unwrap();
    assert_eq!(pandoc.version(), &ToolVersion::new(&[2, 19, 2]));
    assert_eq!(pandoc.program(), copying.as_path());

    // Scratch files are reused between notes
    assert_eq!(pandoc.convert("first").unwrap(), "first");
    assert_eq!(pandoc.convert("second note").unwrap(), "second note");

    // Large stderr output does not stall the child
    let mut chatty = Pandoc::new(noisy, ToolVersion::new(&[3, 1]), Duration::from_secs(5)).unwrap();
    assert_eq!(chatty.convert("hello").unwrap(), "hello");
    assert_eq!(chatty.convert("again").unwrap(), "again");

    // Non-zero exit carries stderr
    let mut broken = Pandoc::new(failing, ToolVersion::new(&[3, 1]), Duration::from_secs(5)).unwrap();
    match broken.convert("<p>x</p>") {
        Err(NsxError::ConverterFailed { stderr, .. }) => assert_eq!(stderr, "unknown reader"),
        other => panic!("expected ConverterFailed, got {other:?}"),
    }

    // A hung converter is killed
    let mut hung = Pandoc::new(slow, ToolVersion::new(&[3, 1]), Duration::from_secs(1)).unwrap();
    let started = std::time::Instant::now();
    let err = hung.convert("<p>x</p>").unwrap_err();
    assert!(matches!(err, NsxError::ConverterTimeout { seconds: 1 }));
    assert!(started.elapsed() < Duration::from_secs(8));

    // Full archive through the copying script
    let archive = tmp.path().join("export.nsx");
    ArchiveBuilder::new()
        .notebook("nb1", "Ideas")
        .note("n1", note("Groceries", "nb1", "milk"))
        .write(&archive);
    let settings = bare_config();
    let mut converter = ArchiveConverter::new(&settings, pandoc, tmp.path().join("out"));
    let report = converter.convert(&archive, None).unwrap();
    assert_eq!(report.converted, 1);
    tmp.child("out/Ideas/Groceries.md").assert("milk");
}
