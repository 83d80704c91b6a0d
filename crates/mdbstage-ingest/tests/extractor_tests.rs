//! MdbToolsExtractor against stand-in `mdb-tables` / `mdb-export` scripts
#![cfg(unix)]
#![allow(clippy::unwrap_used, clippy::expect_used)]

use mdbstage_ingest::error::ExtractError;
use mdbstage_ingest::extract::{extract_all, MdbToolsExtractor, TableExtractor};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Lists `customers`, `broken` and `orders`; `broken` cannot be exported.
const MDB_TABLES: &str = r#"#!/bin/sh
if [ "$1" != "-1" ]; then
  echo "usage: mdb-tables -1 <file>" >&2
  exit 2
fi
case "$2" in
  *bad.mdb) echo "Unable to open file" >&2; exit 1 ;;
  *noisy.mdb) echo "customers"; echo "Warning: unsupported page" >&2; exit 0 ;;
  *empty.mdb) exit 0 ;;
esac
printf 'customers\nbroken\norders\n'
"#;

const MDB_EXPORT: &str = r#"#!/bin/sh
case "$2" in
  customers)
    printf 'customer_id,name,zip\n1,"Lister, Dave",00501\n2,Rimmer,\n'
    ;;
  orders)
    printf 'order_id,amount\n1,7\n'
    ;;
  *)
    echo "Couldn't find table $2" >&2
    exit 1
    ;;
esac
"#;

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

/// Scripts are written once, before any test spawns a process, so no child
/// inherits a write handle to them.
fn fake_tools() -> MdbToolsExtractor {
    static TOOLS: OnceLock<(PathBuf, PathBuf)> = OnceLock::new();
    let (tables, export) = TOOLS.get_or_init(|| {
        let dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join("extractor-tests");
        std::fs::create_dir_all(&dir).unwrap();
        (
            write_script(&dir, "mdb-tables", MDB_TABLES),
            write_script(&dir, "mdb-export", MDB_EXPORT),
        )
    });
    MdbToolsExtractor::new(tables.clone(), export.clone())
}

#[tokio::test]
async fn test_list_tables_in_tool_order() {
    let extractor = fake_tools();
    let tables = extractor
        .list_tables(Path::new("/data/orders.mdb"), None)
        .await
        .unwrap();
    assert_eq!(tables, vec!["customers", "broken", "orders"]);
}

#[tokio::test]
async fn test_list_tables_of_empty_database() {
    let extractor = fake_tools();
    let tables = extractor
        .list_tables(Path::new("/data/empty.mdb"), None)
        .await
        .unwrap();
    assert!(tables.is_empty());
}

#[tokio::test]
async fn test_nonzero_exit_is_tool_failure() {
    let extractor = fake_tools();
    let err = extractor
        .list_tables(Path::new("/data/bad.mdb"), None)
        .await
        .unwrap_err();
    assert!(err.is_tool_failure());
    match err {
        ExtractError::ToolFailed { status, stderr, .. } => {
            assert_eq!(status, Some(1));
            assert_eq!(stderr, "Unable to open file");
        },
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_stderr_output_is_tool_failure() {
    let extractor = fake_tools();
    let err = extractor
        .list_tables(Path::new("/data/noisy.mdb"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractError::ToolFailed { status: Some(0), .. }));
}

#[tokio::test]
async fn test_password_is_accepted() {
    let extractor = fake_tools();
    let tables = extractor
        .list_tables(Path::new("/data/orders.mdb"), Some("secret"))
        .await
        .unwrap();
    assert_eq!(tables.len(), 3);
}

#[tokio::test]
async fn test_read_table_rows_as_text() {
    let extractor = fake_tools();
    let rows = extractor
        .read_table(Path::new("/data/orders.mdb"), "customers")
        .await;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["name"], "Lister, Dave");
    assert_eq!(rows[0]["zip"], "00501");
    assert_eq!(rows[1]["zip"], "");
    let columns: Vec<_> = rows[0].keys().cloned().collect();
    assert_eq!(columns, vec!["customer_id", "name", "zip"]);
}

#[tokio::test]
async fn test_failing_table_yields_no_rows() {
    let extractor = fake_tools();
    let rows = extractor
        .read_table(Path::new("/data/orders.mdb"), "broken")
        .await;
    assert!(rows.is_empty());
}

#[tokio::test]
async fn test_extract_all_isolates_broken_table() {
    let extractor = fake_tools();
    let tables = extract_all(&extractor, Path::new("/data/orders.mdb"), None)
        .await
        .unwrap();

    let names: Vec<_> = tables.keys().cloned().collect();
    assert_eq!(names, vec!["customers", "broken", "orders"]);
    assert_eq!(tables["customers"].len(), 2);
    assert!(tables["broken"].is_empty());
    assert_eq!(tables["orders"][0]["amount"], "7");
}

#[tokio::test]
async fn test_extract_all_propagates_listing_failure() {
    let extractor = fake_tools();
    let result = extract_all(&extractor, Path::new("/data/bad.mdb"), None).await;
    assert!(result.unwrap_err().is_tool_failure());
}
