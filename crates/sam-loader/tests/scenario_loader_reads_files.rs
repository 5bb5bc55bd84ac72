use std::io::Write;

use sam_loader::{LoaderError, ManifestFormat, ManifestLoader};
use sam_schemas::Kind;

const SQL_CONNECTION: &str = r#"
apiVersion: smarter.sh/v1
kind: SqlConnection
metadata:
  name: warehouse
  description: reporting replica
  version: 0.1.0
  tags:
    - reporting
spec:
  connection:
    dbEngine: postgresql
    hostname: db.internal
    port: 5432
    database: reporting
    username: reader
    password: warehouse_password
"#;

#[test]
fn loads_manifest_from_file() {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    f.write_all(SQL_CONNECTION.as_bytes()).unwrap();

    let loaded = ManifestLoader::new()
        .expect_kind(Kind::SqlConnection)
        .load_path(f.path())
        .unwrap();

    assert_eq!(loaded.format, ManifestFormat::Yaml);
    assert_eq!(loaded.manifest.name(), "warehouse");
    assert_eq!(loaded.manifest.metadata().tags(), ["reporting".to_string()]);
}

#[test]
fn missing_file_reports_its_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.yaml");
    let err = ManifestLoader::new().load_path(&path).unwrap_err();
    assert!(matches!(err, LoaderError::Io { .. }));
    assert!(err.to_string().contains("absent.yaml"), "{err}");
}
