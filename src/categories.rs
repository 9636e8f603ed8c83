//
// categories.rs
// Perphix-Deid
//
// Category tables for the annotated dataset: object categories for detection/keypoints and
// sequence categories for surgical phase labels.
//

use serde::Serialize;

use crate::error::DatasetError;

/// Instance segmentation / detection category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AnnotationCategory {
    pub supercategory: &'static str,
    pub id: u32,
    pub name: &'static str,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    pub keypoints: &'static [&'static str],
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    pub skeleton: &'static [[u32; 2]],
}

/// Level of the phase hierarchy a sequence label belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SequenceLevel {
    Task,
    Activity,
    Acquisition,
    Frame,
}

impl SequenceLevel {
    /// Order in which the levels appear at the end of image file names.
    pub const ALL: [SequenceLevel; 4] = [
        SequenceLevel::Task,
        SequenceLevel::Activity,
        SequenceLevel::Acquisition,
        SequenceLevel::Frame,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SequenceLevel::Task => "task",
            SequenceLevel::Activity => "activity",
            SequenceLevel::Acquisition => "acquisition",
            SequenceLevel::Frame => "frame",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SequenceCategory {
    pub supercategory: SequenceLevel,
    pub id: u32,
    pub name: &'static str,
}

const HIP_LEFT_KEYPOINTS: &[&str] = &[
    "l_sps", "l_ips", "l_iof", "l_gsn", "l_it", "l_mof", "l_asis", "l_is",
];
const HIP_RIGHT_KEYPOINTS: &[&str] = &[
    "r_sps", "r_ips", "r_iof", "r_gsn", "r_it", "r_mof", "r_asis", "r_is",
];
const HIP_SKELETON: &[[u32; 2]] = &[
    [0, 1],
    [0, 5],
    [1, 5],
    [1, 2],
    [2, 7],
    [7, 3],
    [3, 6],
    [7, 6],
];
const PELVIS_KEYPOINTS: &[&str] = &[
    "r_sps", "r_ips", "r_iof", "r_gsn", "r_it", "r_mof", "r_asis", "r_is", "l_sps", "l_ips",
    "l_iof", "l_gsn", "l_it", "l_mof", "l_asis", "l_is",
];
const PELVIS_SKELETON: &[[u32; 2]] = &[
    [0, 1],
    [0, 5],
    [1, 5],
    [1, 2],
    [2, 7],
    [7, 3],
    [3, 6],
    [7, 6],
    [8, 9],
    [8, 13],
    [9, 13],
    [9, 10],
    [10, 15],
    [15, 11],
    [11, 14],
    [15, 14],
];

const fn plain(supercategory: &'static str, id: u32, name: &'static str) -> AnnotationCategory {
    AnnotationCategory {
        supercategory,
        id,
        name,
        keypoints: &[],
        skeleton: &[],
    }
}

/// Category id of the combined pelvis (superseded by `hip_left`/`hip_right`, still used for keypoint training).
pub const PELVIS_CATEGORY_ID: u32 = 9;

pub const ANNOTATION_CATEGORIES: [AnnotationCategory; 17] = [
    plain("instrument", 1, "wire"),
    plain("instrument", 2, "screw"),
    AnnotationCategory {
        supercategory: "patient",
        id: 3,
        name: "hip_left",
        keypoints: HIP_LEFT_KEYPOINTS,
        skeleton: HIP_SKELETON,
    },
    AnnotationCategory {
        supercategory: "patient",
        id: 4,
        name: "hip_right",
        keypoints: HIP_RIGHT_KEYPOINTS,
        skeleton: HIP_SKELETON,
    },
    plain("patient", 5, "femur_left"),
    plain("patient", 6, "femur_right"),
    plain("patient", 7, "sacrum"),
    plain("patient", 8, "vertebrae_L5"),
    AnnotationCategory {
        supercategory: "patient",
        id: PELVIS_CATEGORY_ID,
        name: "pelvis",
        keypoints: PELVIS_KEYPOINTS,
        skeleton: PELVIS_SKELETON,
    },
    plain("corridor", 10, "s1_left"),
    plain("corridor", 11, "s1_right"),
    plain("corridor", 12, "s1"),
    plain("corridor", 13, "s2"),
    plain("corridor", 14, "ramus_left"),
    plain("corridor", 15, "ramus_right"),
    plain("corridor", 16, "teardrop_left"),
    plain("corridor", 17, "teardrop_right"),
];

const fn seq(supercategory: SequenceLevel, id: u32, name: &'static str) -> SequenceCategory {
    SequenceCategory {
        supercategory,
        id,
        name,
    }
}

pub const SEQUENCE_CATEGORIES: [SequenceCategory; 21] = [
    seq(SequenceLevel::Task, 0, "s1_left"),
    seq(SequenceLevel::Task, 1, "s1_right"),
    seq(SequenceLevel::Task, 2, "s1"),
    seq(SequenceLevel::Task, 3, "s2"),
    seq(SequenceLevel::Task, 4, "ramus_left"),
    seq(SequenceLevel::Task, 5, "ramus_right"),
    seq(SequenceLevel::Task, 6, "teardrop_left"),
    seq(SequenceLevel::Task, 7, "teardrop_right"),
    seq(SequenceLevel::Activity, 8, "position_wire"),
    seq(SequenceLevel::Activity, 9, "insert_wire"),
    seq(SequenceLevel::Activity, 10, "insert_screw"),
    seq(SequenceLevel::Acquisition, 11, "ap"),
    seq(SequenceLevel::Acquisition, 12, "lateral"),
    seq(SequenceLevel::Acquisition, 13, "inlet"),
    seq(SequenceLevel::Acquisition, 14, "outlet"),
    seq(SequenceLevel::Acquisition, 15, "oblique_left"),
    seq(SequenceLevel::Acquisition, 16, "oblique_right"),
    seq(SequenceLevel::Acquisition, 17, "teardrop_left"),
    seq(SequenceLevel::Acquisition, 18, "teardrop_right"),
    seq(SequenceLevel::Frame, 19, "fluoro_hunting"),
    seq(SequenceLevel::Frame, 20, "assessment"),
];

pub fn annotation_category(name: &str) -> Result<&'static AnnotationCategory, DatasetError> {
    ANNOTATION_CATEGORIES
        .iter()
        .find(|c| c.name == name)
        .ok_or_else(|| DatasetError::UnknownAnnotationCategory(name.to_string()))
}

pub fn annotation_catid(name: &str) -> Result<u32, DatasetError> {
    annotation_category(name).map(|c| c.id)
}

pub fn annotation_name(catid: u32) -> Result<&'static str, DatasetError> {
    ANNOTATION_CATEGORIES
        .iter()
        .find(|c| c.id == catid)
        .map(|c| c.name)
        .ok_or(DatasetError::UnknownCategoryId(catid))
}

/// Sequence names repeat across levels (`teardrop_left` is both a task and an acquisition),
/// so lookups by name need the level.
pub fn sequence_catid(level: SequenceLevel, name: &str) -> Result<u32, DatasetError> {
    SEQUENCE_CATEGORIES
        .iter()
        .find(|c| c.supercategory == level && c.name == name)
        .map(|c| c.id)
        .ok_or_else(|| DatasetError::UnknownSequenceCategory {
            level: level.as_str(),
            name: name.to_string(),
        })
}

pub fn sequence_category(catid: u32) -> Result<&'static SequenceCategory, DatasetError> {
    SEQUENCE_CATEGORIES
        .iter()
        .find(|c| c.id == catid)
        .ok_or(DatasetError::UnknownCategoryId(catid))
}

pub fn sequence_name(catid: u32) -> Result<&'static str, DatasetError> {
    sequence_category(catid).map(|c| c.name)
}
