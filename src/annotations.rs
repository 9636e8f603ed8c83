//
// annotations.rs
// Perphix-Deid
//
// COCO-style annotation documents for the de-identified dataset: the empty base document and
// the transforms used to prepare training splits.
//

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::categories::{
    self, SequenceLevel, ANNOTATION_CATEGORIES, PELVIS_CATEGORY_ID, SEQUENCE_CATEGORIES,
};
use crate::error::DatasetError;

#[derive(Debug, Clone, Serialize)]
pub struct DatasetInfo {
    pub description: &'static str,
    pub url: &'static str,
    pub version: &'static str,
    pub year: u32,
    pub contributor: &'static str,
    pub date_created: String,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct License {
    pub url: &'static str,
    pub id: u32,
    pub name: &'static str,
}

pub const LICENSES: [License; 3] = [
    License {
        url: "https://nmdid.unm.edu/resources/data-use",
        id: 1,
        name: "NMDID Data Use Agreement",
    },
    License {
        url: "http://creativecommons.org/licenses/by-nc-sa/2.0/",
        id: 2,
        name: "Attribution-NonCommercial-ShareAlike License",
    },
    License {
        url: "http://creativecommons.org/licenses/by-nc/2.0/",
        id: 3,
        name: "Attribution-NonCommercial License",
    },
];

impl DatasetInfo {
    /// Dataset header stamped with today's local date.
    pub fn current() -> Self {
        DatasetInfo {
            description:
                "Percutaneous fracture fixation. If you use this dataset, kindly cite the paper.",
            url: "https://github.com/arcadelab/perphix.",
            version: "0.1",
            year: 2023,
            contributor: "Benjamin D. Killeen, ARCADE Lab, Johns Hopkins University",
            date_created: chrono::Local::now().format("%Y-%m-%d").to_string(),
        }
    }
}

/// Empty document carrying the dataset header and both category tables.
pub fn base_annotation() -> Value {
    json!({
        "info": DatasetInfo::current(),
        "licenses": LICENSES,
        "images": [],
        "annotations": [],
        "categories": ANNOTATION_CATEGORIES,
        "sequences": [],
        "seq_categories": SEQUENCE_CATEGORIES,
    })
}

fn array_mut<'a>(
    doc: &'a mut Value,
    field: &'static str,
) -> Result<&'a mut Vec<Value>, DatasetError> {
    doc.get_mut(field)
        .and_then(Value::as_array_mut)
        .ok_or(DatasetError::MissingField(field))
}

/// Copy of `annotation` with the `keypoints` of every instance dropped.
pub fn remove_keypoints(annotation: &Value) -> Result<Value, DatasetError> {
    let mut doc = annotation.clone();
    for anno in array_mut(&mut doc, "annotations")?.iter_mut() {
        if let Some(fields) = anno.as_object_mut() {
            fields.remove("keypoints");
        }
    }
    Ok(doc)
}

/// Copy of `annotation` restricted to pelvis instances and the pelvis category.
pub fn pelvis_only(annotation: &Value) -> Result<Value, DatasetError> {
    let mut doc = annotation.clone();
    array_mut(&mut doc, "annotations")?.retain(|anno| {
        anno.get("category_id").and_then(Value::as_u64) == Some(u64::from(PELVIS_CATEGORY_ID))
    });
    array_mut(&mut doc, "categories")?
        .retain(|cat| cat.get("name").and_then(Value::as_str) == Some("pelvis"));
    Ok(doc)
}

/// The four phase labels at the end of a frame's file name,
/// e.g. `..._0042-s1_left-insert_wire-ap-assessment.png`.
fn phase_labels(file_name: &str) -> Result<Vec<String>, DatasetError> {
    let stem = file_name.split('.').next().unwrap_or(file_name);
    let parts: Vec<&str> = stem.split('-').collect();
    if parts.len() < SequenceLevel::ALL.len() {
        return Err(DatasetError::MalformedFileName(file_name.to_string()));
    }
    Ok(parts[parts.len() - SequenceLevel::ALL.len()..]
        .iter()
        .map(|s| s.to_string())
        .collect())
}

struct OpenRun {
    label: String,
    first_frame_id: Value,
    length: u64,
}

fn close_run(id: usize, level: SequenceLevel, run: &OpenRun) -> Result<Value, DatasetError> {
    let seq_category_id = categories::sequence_catid(level, &run.label.replace("screw_", ""))?;
    Ok(json!({
        "id": id,
        "first_frame_id": run.first_frame_id,
        "seq_length": run.length,
        "seq_category_id": seq_category_id,
    }))
}

/// Rebuild `sequences` from the phase labels encoded in the image file names.
///
/// Images are taken in document order. A run at each level closes whenever that level's label
/// changes; the runs still open after the last image are closed in level order.
pub fn fix_sequences(annotation: &Value) -> Result<Value, DatasetError> {
    let images = annotation
        .get("images")
        .and_then(Value::as_array)
        .ok_or(DatasetError::MissingField("images"))?;

    let mut sequences = Vec::new();
    let mut open: Vec<OpenRun> = Vec::new();
    for (index, image) in images.iter().enumerate() {
        let image_id = image
            .get("id")
            .ok_or(DatasetError::MalformedImage { index, field: "id" })?;
        let file_name = image
            .get("file_name")
            .and_then(Value::as_str)
            .ok_or(DatasetError::MalformedImage {
                index,
                field: "file_name",
            })?;
        let labels = phase_labels(file_name)?;

        if open.is_empty() {
            open = labels
                .into_iter()
                .map(|label| OpenRun {
                    label,
                    first_frame_id: image_id.clone(),
                    length: 1,
                })
                .collect();
            continue;
        }

        for ((level, run), label) in SequenceLevel::ALL.iter().zip(open.iter_mut()).zip(labels) {
            if run.label != label {
                let id = sequences.len();
                sequences.push(close_run(id, *level, run)?);
                run.first_frame_id = image_id.clone();
                run.length = 0;
            }
            run.length += 1;
            run.label = label;
        }
    }

    for (level, run) in SequenceLevel::ALL.iter().zip(&open) {
        let id = sequences.len();
        sequences.push(close_run(id, *level, run)?);
    }
    debug!(sequences = sequences.len(), "rebuilt sequences");

    let mut doc = annotation.clone();
    if let Some(fields) = doc.as_object_mut() {
        fields.insert("sequences".to_string(), Value::Array(sequences));
    }
    Ok(doc)
}

pub fn read_annotation(path: &Path) -> Result<Value> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open annotation file {}", path.display()))?;
    let doc: Value = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse annotation file {}", path.display()))?;
    if !doc.is_object() {
        anyhow::bail!("{} is not a JSON object", path.display());
    }
    Ok(doc)
}

/// Pretty-print `doc` to `output`, or to stdout when no path is given.
pub fn write_annotation(doc: &Value, output: Option<&Path>) -> Result<()> {
    let text = serde_json::to_string_pretty(doc).context("Failed to serialize annotation")?;
    match output {
        Some(path) => {
            std::fs::write(path, text)
                .with_context(|| format!("Failed to write annotation file {}", path.display()))?;
            println!("Annotation saved to {}", path.display());
        }
        None => println!("{text}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(id: u64, labels: &str) -> Value {
        json!({"id": id, "file_name": format!("case_004217_{id:04}-{labels}.png")})
    }

    fn doc_with_images(images: Vec<Value>) -> Value {
        let mut doc = base_annotation();
        doc["images"] = Value::Array(images);
        doc
    }

    #[test]
    fn base_annotation_has_coco_layout() {
        let doc = base_annotation();
        assert_eq!(doc["licenses"].as_array().unwrap().len(), 3);
        assert_eq!(doc["categories"].as_array().unwrap().len(), 17);
        assert_eq!(doc["seq_categories"].as_array().unwrap().len(), 21);
        assert!(doc["images"].as_array().unwrap().is_empty());
        assert_eq!(doc["info"]["year"], 2023);
        let date = doc["info"]["date_created"].as_str().unwrap();
        assert!(chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d").is_ok(), "{date}");
        assert_eq!(doc["categories"][8]["keypoints"].as_array().unwrap().len(), 16);
        assert!(doc["categories"][0].get("keypoints").is_none());
    }

    #[test]
    fn fix_sequences_splits_runs_per_level() {
        let doc = doc_with_images(vec![
            frame(1, "s1_left-position_wire-ap-fluoro_hunting"),
            frame(2, "s1_left-position_wire-ap-assessment"),
            frame(3, "s1_left-insert_wire-lateral-assessment"),
            frame(4, "s2-insert_screw-lateral-assessment"),
        ]);

        let fixed = fix_sequences(&doc).unwrap();
        let seqs = fixed["sequences"].as_array().unwrap();
        let summary: Vec<(u64, u64, u64)> = seqs
            .iter()
            .map(|s| {
                (
                    s["first_frame_id"].as_u64().unwrap(),
                    s["seq_length"].as_u64().unwrap(),
                    s["seq_category_id"].as_u64().unwrap(),
                )
            })
            .collect();
        assert_eq!(
            summary,
            vec![
                (1, 1, 19),  // fluoro_hunting closes at frame 2
                (1, 2, 8),   // position_wire closes at frame 3
                (1, 2, 11),  // ap closes at frame 3
                (1, 3, 0),   // s1_left closes at frame 4
                (3, 1, 9),   // insert_wire closes at frame 4
                (4, 1, 3),   // open runs closed in level order
                (4, 1, 10),
                (3, 2, 12),
                (2, 3, 20),
            ]
        );
        let ids: Vec<u64> = seqs.iter().map(|s| s["id"].as_u64().unwrap()).collect();
        assert_eq!(ids, (0..9).collect::<Vec<_>>());
        // input is left untouched
        assert!(doc["sequences"].as_array().unwrap().is_empty());
    }

    #[test]
    fn fix_sequences_strips_screw_prefix_and_uses_trailing_labels() {
        let doc = doc_with_images(vec![frame(7, "extra-screw_s1-insert_screw-inlet-assessment")]);
        let fixed = fix_sequences(&doc).unwrap();
        let cats: Vec<u64> = fixed["sequences"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["seq_category_id"].as_u64().unwrap())
            .collect();
        assert_eq!(cats, vec![2, 10, 13, 20]);
    }

    #[test]
    fn fix_sequences_rejects_bad_names() {
        let short = doc_with_images(vec![frame(1, "s1-ap")]);
        assert!(matches!(
            fix_sequences(&short),
            Err(DatasetError::MalformedFileName(_))
        ));

        let unknown = doc_with_images(vec![frame(1, "s3-insert_wire-ap-assessment")]);
        assert!(matches!(
            fix_sequences(&unknown),
            Err(DatasetError::UnknownSequenceCategory { level: "task", .. })
        ));

        assert!(matches!(
            fix_sequences(&json!({})),
            Err(DatasetError::MissingField("images"))
        ));
    }

    #[test]
    fn fix_sequences_without_images_is_empty() {
        let fixed = fix_sequences(&base_annotation()).unwrap();
        assert!(fixed["sequences"].as_array().unwrap().is_empty());
    }

    #[test]
    fn pelvis_only_and_remove_keypoints() {
        let mut doc = base_annotation();
        doc["annotations"] = json!([
            {"id": 1, "category_id": 9, "keypoints": [1, 2, 2]},
            {"id": 2, "category_id": 1},
            {"id": 3, "category_id": 3, "keypoints": [4, 5, 2]},
        ]);

        let pelvis = pelvis_only(&doc).unwrap();
        assert_eq!(pelvis["annotations"].as_array().unwrap().len(), 1);
        assert_eq!(pelvis["annotations"][0]["id"], 1);
        assert_eq!(pelvis["categories"].as_array().unwrap().len(), 1);
        assert_eq!(pelvis["categories"][0]["name"], "pelvis");

        let stripped = remove_keypoints(&doc).unwrap();
        let annos = stripped["annotations"].as_array().unwrap();
        assert_eq!(annos.len(), 3);
        assert!(annos.iter().all(|a| a.get("keypoints").is_none()));
        assert!(doc["annotations"][0].get("keypoints").is_some());
    }

    #[test]
    fn read_and_write_round_through_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("annotations.json");
        write_annotation(&base_annotation(), Some(&path)).unwrap();
        let doc = read_annotation(&path).unwrap();
        assert_eq!(doc["seq_categories"][20]["name"], "assessment");

        std::fs::write(&path, "[1, 2]").unwrap();
        assert!(read_annotation(&path).is_err());
    }
}
