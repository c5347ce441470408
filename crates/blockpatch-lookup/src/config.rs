use crate::conversion::{ConversionLookupBuilder, BLOCK_ID_LIMIT, DATA_VALUES};
use crate::segment::{SegmentLookup, SEGMENTS};
use blockpatch_common::{PatchError, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Data value substitution for one block id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataOverride {
    pub block: u32,
    pub from: u32,
    pub to: u32,
}

/// Extra mappings applied on top of the column-wide table for one section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionOverride {
    pub section: u32,
    #[serde(default)]
    pub overrides: BTreeMap<u32, u32>,
    #[serde(default)]
    pub data_overrides: Vec<DataOverride>,
}

/// Default translation table as read from JSON.
///
/// ```json
/// { "overrides": { "1": 9 },
///   "data_overrides": [ { "block": 35, "from": 0, "to": 14 } ],
///   "sections": [ { "section": 0, "overrides": { "56": 1 } } ] }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupConfig {
    #[serde(default)]
    pub overrides: BTreeMap<u32, u32>,
    #[serde(default)]
    pub data_overrides: Vec<DataOverride>,
    #[serde(default)]
    pub sections: Vec<SectionOverride>,
}

impl LookupConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: LookupConfig =
            serde_json::from_str(json).map_err(|e| PatchError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        validate_blocks(&self.overrides, "overrides")?;
        validate_data(&self.data_overrides, "data_overrides")?;
        for section in &self.sections {
            if section.section as usize >= SEGMENTS {
                return Err(PatchError::Config(format!(
                    "section {} is outside 0..{}",
                    section.section, SEGMENTS
                )));
            }
            let context = format!("sections[{}]", section.section);
            validate_blocks(&section.overrides, &context)?;
            validate_data(&section.data_overrides, &context)?;
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty() && self.data_overrides.is_empty() && self.sections.is_empty()
    }

    /// Builds the table described by this document. An empty document is
    /// the identity table.
    pub fn into_segment_lookup(&self) -> Result<SegmentLookup> {
        self.validate()?;
        if self.is_empty() {
            warn!("No block overrides provided");
            return Ok(SegmentLookup::identity());
        }

        let mut base = ConversionLookupBuilder::new();
        apply(&mut base, &self.overrides, &self.data_overrides)?;
        let mut lookup = SegmentLookup::with_base(Arc::new(base.build()));

        for section in &self.sections {
            let segment = section.section as usize;
            let mut builder = ConversionLookupBuilder::from_lookup(lookup.segment_view(segment));
            apply(&mut builder, &section.overrides, &section.data_overrides)?;
            lookup.set_override(segment, Arc::new(builder.build()))?;
        }

        info!(
            "Loaded {} overrides, {} data overrides and {} section overrides",
            self.overrides.len(),
            self.data_overrides.len(),
            self.sections.len()
        );
        Ok(lookup)
    }
}

fn validate_blocks(overrides: &BTreeMap<u32, u32>, context: &str) -> Result<()> {
    for (&from, &to) in overrides {
        if from as usize >= BLOCK_ID_LIMIT || to as usize >= BLOCK_ID_LIMIT {
            return Err(PatchError::Config(format!(
                "{}: block mapping {} -> {} is outside 0..{}",
                context, from, to, BLOCK_ID_LIMIT
            )));
        }
    }
    Ok(())
}

fn validate_data(overrides: &[DataOverride], context: &str) -> Result<()> {
    for entry in overrides {
        if entry.block as usize >= BLOCK_ID_LIMIT
            || entry.from as usize >= DATA_VALUES
            || entry.to as usize >= DATA_VALUES
        {
            return Err(PatchError::Config(format!(
                "{}: data mapping {:?} is out of range",
                context, entry
            )));
        }
    }
    Ok(())
}

fn apply(
    builder: &mut ConversionLookupBuilder,
    overrides: &BTreeMap<u32, u32>,
    data_overrides: &[DataOverride],
) -> Result<()> {
    for (&from, &to) in overrides {
        builder.map_block(from, to)?;
    }
    for entry in data_overrides {
        builder.map_data(entry.block, entry.from, entry.to)?;
    }
    Ok(())
}
