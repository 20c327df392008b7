//! Layer files on disk.
//!
//! `.json` layer document:
//!
//! ```text
//! {
//!   "name": "parcels",
//!   "geometry_type": "Point",            (optional)
//!   "filter": "date_maj >= '2024-01-01'", (optional)
//!   "fields": [{"name": "IDU", "type": "String"}, ...],
//!   "features": [{"properties": {"IDU": "A1", ...}, "geometry": "POINT (1 1)"}]
//! }
//! ```
//!
//! `.csv`: header cells are `name:Type` (a bare `name` is a String field).
//! An optional `geometry` or `geometry:<GeometryType>` column holds WKT.
//! Empty cells are null. In String columns a cell starting with `\` has that
//! first backslash stripped, so `\` alone is the empty string. The dataset
//! name is the file stem; CSV has no slot for a filter.
//!
//! Saving writes a temporary file next to the destination and renames it over
//! the destination, so a failed save leaves the previous file in place.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use anyhow::{bail, Context, Result};
use gsync_dataset::{Dataset, Field, FieldType, Geometry, GeometryType, Record, Schema, Value};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use tracing::warn;

/// A dataset as read from disk, with the filter its document declared.
#[derive(Debug, Clone)]
pub struct LayerFile {
    pub dataset: Dataset,
    pub filter: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Csv,
}

fn format_of(path: &Path) -> Result<Format> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("json") => Ok(Format::Json),
        Some("csv") => Ok(Format::Csv),
        _ => bail!(
            "unsupported layer file '{}': expected .json or .csv",
            path.display()
        ),
    }
}

fn stem_of(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "layer".to_string())
}

pub fn load(path: &Path) -> Result<LayerFile> {
    let loaded = match format_of(path)? {
        Format::Json => load_json(path),
        Format::Csv => load_csv(path),
    };
    loaded.with_context(|| format!("load layer: {}", path.display()))
}

/// Write every record of `dataset`; `filter` is kept where the format allows.
pub fn save(path: &Path, dataset: &Dataset, filter: Option<&str>) -> Result<()> {
    let saved = match format_of(path)? {
        Format::Json => save_json(path, dataset, filter),
        Format::Csv => {
            if let Some(f) = filter {
                warn!(
                    path = %path.display(),
                    filter = f,
                    "csv has no filter slot, filter not saved"
                );
            }
            save_csv(path, dataset)
        }
    };
    saved.with_context(|| format!("save layer: {}", path.display()))
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
struct LayerDoc {
    #[serde(default)]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    geometry_type: Option<GeometryType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    filter: Option<String>,
    fields: Vec<Field>,
    #[serde(default)]
    features: Vec<FeatureDoc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct FeatureDoc {
    #[serde(default)]
    properties: serde_json::Map<String, Json>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    geometry: Option<String>,
}

fn load_json(path: &Path) -> Result<LayerFile> {
    let raw = fs::read_to_string(path).context("read layer document")?;
    let doc: LayerDoc = serde_json::from_str(&raw).context("parse layer document")?;

    let name = doc.name.unwrap_or_else(|| stem_of(path));
    let schema = Schema::new(doc.fields);
    let mut dataset = Dataset::new(name, schema.clone());
    if let Some(gt) = doc.geometry_type {
        dataset = dataset.with_geometry_type(gt);
    }

    for (n, feature) in doc.features.into_iter().enumerate() {
        if let Some(unknown) = feature
            .properties
            .keys()
            .find(|k| !schema.contains(k.as_str()))
        {
            bail!("feature #{n}: unknown property '{unknown}'");
        }
        let mut values = Vec::with_capacity(schema.len());
        for field in schema.fields() {
            let v = match feature.properties.get(&field.name) {
                None => Value::Null,
                Some(j) => value_from_json(field, j)
                    .with_context(|| format!("feature #{n}, field '{}'", field.name))?,
            };
            values.push(v);
        }
        let mut record = Record::new(values);
        if let Some(wkt) = feature.geometry.filter(|w| !w.trim().is_empty()) {
            record = record.with_geometry(Geometry::from_wkt(&wkt));
        }
        dataset
            .push(record)
            .with_context(|| format!("feature #{n}"))?;
    }

    Ok(LayerFile {
        dataset,
        filter: doc.filter.filter(|f| !f.trim().is_empty()),
    })
}

fn value_from_json(field: &Field, j: &Json) -> Result<Value> {
    let v = match j {
        Json::Null => Value::Null,
        Json::String(s) if s.is_empty() && field.field_type != FieldType::String => Value::Null,
        Json::String(s) => Value::parse_as(field.field_type, s)?,
        Json::Number(n) => Value::parse_as(field.field_type, &n.to_string())?,
        other => bail!("unsupported JSON value {other}"),
    };
    Ok(v)
}

fn save_json(path: &Path, dataset: &Dataset, filter: Option<&str>) -> Result<()> {
    let mut features = Vec::with_capacity(dataset.len());
    for record in dataset.records() {
        let mut properties = serde_json::Map::new();
        for (field, value) in dataset.schema().fields().iter().zip(record.values()) {
            properties.insert(field.name.clone(), serde_json::to_value(value)?);
        }
        features.push(FeatureDoc {
            properties,
            geometry: record.geometry().map(|g| g.wkt().to_string()),
        });
    }

    let doc = LayerDoc {
        name: Some(dataset.name().to_string()),
        geometry_type: dataset.geometry_type(),
        filter: filter.map(str::to_string),
        fields: dataset.schema().fields().to_vec(),
        features,
    };
    let out = serde_json::to_string_pretty(&doc).context("serialize layer document")?;
    write_atomically(path, |file| {
        file.write_all(out.as_bytes())?;
        file.write_all(b"\n")?;
        Ok(())
    })
    .context("write layer document")
}

/// Run `write` against a temporary file in `path`'s directory, then move it
/// over `path`. On error the temporary file is removed and `path` is untouched.
fn write_atomically(path: &Path, write: impl FnOnce(&mut File) -> Result<()>) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("create temporary file in {}", dir.display()))?;
    write(tmp.as_file_mut())?;
    tmp.as_file().sync_all().context("sync temporary file")?;
    tmp.persist(path)
        .with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

fn load_csv(path: &Path) -> Result<LayerFile> {
    let mut rdr = csv::Reader::from_path(path).context("open csv")?;
    let headers = rdr.headers().context("read csv header")?.clone();

    let mut columns: Vec<(usize, Field)> = Vec::new();
    let mut geometry: Option<(usize, GeometryType)> = None;
    for (i, cell) in headers.iter().enumerate() {
        let (name, ty) = match cell.split_once(':') {
            Some((n, t)) => (n.trim(), Some(t.trim())),
            None => (cell.trim(), None),
        };
        if name.eq_ignore_ascii_case("geometry") {
            if geometry.is_some() {
                bail!("more than one geometry column");
            }
            let gt = match ty {
                Some(t) => t.parse::<GeometryType>().map_err(anyhow::Error::msg)?,
                None => GeometryType::Unknown,
            };
            geometry = Some((i, gt));
            continue;
        }
        let field_type = match ty {
            Some(t) => t
                .parse::<FieldType>()
                .with_context(|| format!("csv column '{cell}'"))?,
            None => FieldType::String,
        };
        columns.push((i, Field::new(name, field_type)));
    }

    let schema = Schema::new(columns.iter().map(|(_, f)| f.clone()).collect());
    let mut dataset = Dataset::new(stem_of(path), schema);
    if let Some((_, gt)) = geometry {
        dataset = dataset.with_geometry_type(gt);
    }

    for (n, row) in rdr.records().enumerate() {
        // Row numbers count the header as line 1.
        let line = n + 2;
        let row = row.with_context(|| format!("csv line {line}"))?;
        let mut values = Vec::with_capacity(columns.len());
        for (i, field) in &columns {
            let cell = row.get(*i).unwrap_or("");
            let v = if cell.is_empty() {
                Value::Null
            } else if field.field_type == FieldType::String {
                Value::Text(unescape_text(cell).to_string())
            } else {
                Value::parse_as(field.field_type, cell)
                    .with_context(|| format!("csv line {line}, column '{}'", field.name))?
            };
            values.push(v);
        }
        let mut record = Record::new(values);
        if let Some((i, _)) = geometry {
            let wkt = row.get(i).unwrap_or("");
            if !wkt.trim().is_empty() {
                record = record.with_geometry(Geometry::from_wkt(wkt));
            }
        }
        dataset
            .push(record)
            .with_context(|| format!("csv line {line}"))?;
    }

    Ok(LayerFile {
        dataset,
        filter: None,
    })
}

fn save_csv(path: &Path, dataset: &Dataset) -> Result<()> {
    write_atomically(path, |file| write_csv(file, dataset))
}

fn write_csv(file: &mut File, dataset: &Dataset) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(file);

    let mut header: Vec<String> = dataset
        .schema()
        .fields()
        .iter()
        .map(|f| format!("{}:{}", f.name, f.field_type))
        .collect();
    if let Some(gt) = dataset.geometry_type() {
        header.push(format!("geometry:{}", gt.as_str()));
    }
    wtr.write_record(&header)?;

    for record in dataset.records() {
        let mut row: Vec<String> = record
            .values()
            .iter()
            .map(csv_cell)
            .collect();
        if dataset.has_geometry() {
            row.push(record.geometry().map(|g| g.wkt().to_string()).unwrap_or_default());
        }
        wtr.write_record(&row)?;
    }
    wtr.flush()?;
    Ok(())
}

fn csv_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Text(s) if s.is_empty() || s.starts_with('\\') => format!("\\{s}"),
        other => other.to_string(),
    }
}

fn unescape_text(cell: &str) -> &str {
    cell.strip_prefix('\\').unwrap_or(cell)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"{
        "name": "main",
        "geometry_type": "Point",
        "filter": "name = 'x'",
        "fields": [
            {"name": "IDU", "type": "String"},
            {"name": "area", "type": "Real"},
            {"name": "date_maj", "type": "Date"}
        ],
        "features": [
            {
                "properties": {"IDU": "A1", "area": 12, "date_maj": "2024-01-01"},
                "geometry": "POINT (1 1)"
            },
            {"properties": {"IDU": "A2", "date_maj": ""}}
        ]
    }"#;

    #[test]
    fn json_document_loads_types_filter_and_geometry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.json");
        fs::write(&path, DOC).unwrap();

        let file = load(&path).unwrap();
        assert_eq!(file.filter.as_deref(), Some("name = 'x'"));
        let ds = &file.dataset;
        assert_eq!(ds.geometry_type(), Some(GeometryType::Point));
        assert_eq!(ds.len(), 2);
        assert!(matches!(ds.records()[0].value_at(1), Value::Real(r) if *r == 12.0));
        assert!(ds.records()[1].value_at(1).is_null());
        assert!(ds.records()[1].value_at(2).is_null());
        assert!(ds.records()[1].geometry().is_none());
    }

    #[test]
    fn json_rejects_unknown_properties() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(
            &path,
            r#"{"fields": [{"name": "IDU", "type": "String"}],
                "features": [{"properties": {"idu": "A1"}}]}"#,
        )
        .unwrap();
        let err = format!("{:#}", load(&path).unwrap_err());
        assert!(err.contains("unknown property 'idu'"), "{err}");
    }

    #[test]
    fn csv_header_declares_types_and_geometry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("field.csv");
        fs::write(
            &path,
            "IDU,count:Integer,date_maj:Date,geometry:Point\nA1,3,2024-06-01,POINT(2 2)\nA2,,,\n",
        )
        .unwrap();

        let file = load(&path).unwrap();
        let ds = &file.dataset;
        assert_eq!(ds.name(), "field");
        assert_eq!(ds.schema().len(), 3);
        assert_eq!(ds.schema().fields()[0].field_type, FieldType::String);
        assert_eq!(ds.records()[0].value_at(1), &Value::Integer(3));
        assert_eq!(
            ds.records()[0].geometry(),
            Some(&Geometry::from_wkt("POINT(2 2)"))
        );
        assert!(ds.records()[1].value_at(1).is_null());
    }

    #[test]
    fn csv_reports_line_of_bad_cell() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("field.csv");
        fs::write(&path, "IDU,count:Integer\nA1,1\nA2,two\n").unwrap();
        let err = format!("{:#}", load(&path).unwrap_err());
        assert!(err.contains("csv line 3"), "{err}");
    }

    #[test]
    fn saved_files_load_back_identically() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("main.json");
        fs::write(&src, DOC).unwrap();
        let original = load(&src).unwrap();

        let json_out = dir.path().join("out.json");
        save(&json_out, &original.dataset, original.filter.as_deref()).unwrap();
        let again = load(&json_out).unwrap();
        assert_eq!(again.dataset, original.dataset);
        assert_eq!(again.filter, original.filter);

        let csv_out = dir.path().join("main.csv");
        save(&csv_out, &original.dataset, None).unwrap();
        assert_eq!(load(&csv_out).unwrap().dataset, original.dataset);
    }

    #[test]
    fn csv_keeps_empty_text_apart_from_null() {
        let dir = tempfile::tempdir().unwrap();
        let schema = Schema::of(&[
            ("IDU", FieldType::String),
            ("name", FieldType::String),
            ("seen", FieldType::DateTime),
        ]);
        let stamp = chrono::NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_milli_opt(8, 15, 0, 125)
            .unwrap();
        let mut ds = Dataset::new("main", schema);
        let names = [
            ("A1", Value::from("")),
            ("A2", Value::Null),
            ("A3", Value::from("\\dir")),
        ];
        for (idu, name) in names {
            ds.push(Record::new(vec![idu.into(), name, Value::DateTime(stamp)]))
                .unwrap();
        }

        let path = dir.path().join("main.csv");
        save(&path, &ds, None).unwrap();
        let back = load(&path).unwrap().dataset;
        assert_eq!(back.records()[0].value_at(1), &Value::from(""));
        assert!(back.records()[1].value_at(1).is_null());
        assert_eq!(back.records()[2].value_at(1), &Value::from("\\dir"));
        assert_eq!(back, ds);
    }

    #[test]
    fn failed_write_leaves_previous_file_intact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.json");
        fs::write(&path, DOC).unwrap();

        let err = write_atomically(&path, |file| {
            file.write_all(b"{ half a docu")?;
            bail!("disk full")
        })
        .unwrap_err();
        assert!(err.to_string().contains("disk full"));
        assert_eq!(fs::read_to_string(&path).unwrap(), DOC);
        // No temporary file is left behind.
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);

        save(&path, &load(&path).unwrap().dataset, None).unwrap();
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
        assert!(load(&path).unwrap().filter.is_none());
    }

    #[test]
    fn unknown_extension_is_refused() {
        let err = load(Path::new("parcels.shp")).unwrap_err();
        assert!(err.to_string().contains("expected .json or .csv"));
    }
}
