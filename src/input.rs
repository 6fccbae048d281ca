/// JSON input documents and JSON/CSV result writers.
use std::error::Error;
use std::fs;
use std::path::PathBuf;

use ndarray::Array3;
use serde::{Deserialize, Serialize};

use crate::mutrel::{Clusters, NUM_RELATIONS};
use crate::sampler::{TreeInput, TreeSample};
use crate::supervars::Supervar;
use crate::tree;

/// On-disk input: sample names, cluster partition, per-cluster read counts
/// and the observed M x M x 4 relation tensor as nested arrays.
#[derive(Debug, Serialize, Deserialize)]
pub struct InputDocument {
    pub sample_names: Vec<String>,
    pub clusters: Vec<Vec<usize>>,
    pub supervars: Vec<Supervar>,
    pub data_mutrel: Vec<Vec<Vec<f64>>>,
}

impl InputDocument {
    pub fn into_tree_input(self) -> Result<TreeInput, Box<dyn Error>> {
        let clusters = Clusters::new(self.clusters);
        let m = clusters.num_mutations();

        let mut data_mutrel = Array3::zeros((m, m, NUM_RELATIONS));
        if self.data_mutrel.len() != m {
            return Err(format!(
                "relation tensor has {} rows but the clusters name {} mutations",
                self.data_mutrel.len(),
                m
            )
            .into());
        }
        for (i, row) in self.data_mutrel.iter().enumerate() {
            if row.len() != m {
                return Err(format!("relation tensor row {} has length {}", i, row.len()).into());
            }
            for (j, rel) in row.iter().enumerate() {
                if rel.len() != NUM_RELATIONS {
                    return Err(format!(
                        "relation tensor entry ({}, {}) has {} categories, expected {}",
                        i,
                        j,
                        rel.len(),
                        NUM_RELATIONS
                    )
                    .into());
                }
                for (r, &v) in rel.iter().enumerate() {
                    data_mutrel[[i, j, r]] = v;
                }
            }
        }

        for sv in &self.supervars {
            if sv.num_samples() != self.sample_names.len() {
                return Err(format!(
                    "supervariant {} has {} samples, expected {}",
                    sv.name,
                    sv.num_samples(),
                    self.sample_names.len()
                )
                .into());
            }
        }

        Ok(TreeInput::new(data_mutrel, self.supervars, clusters))
    }
}

pub fn load_input(path: &PathBuf) -> Result<TreeInput, Box<dyn Error>> {
    let raw = fs::read_to_string(path)?;
    let doc: InputDocument = serde_json::from_str(&raw)?;
    doc.into_tree_input()
}

/// Fixed tree for the `score` subcommand: parents of nodes 1..K-1.
#[derive(Debug, Serialize, Deserialize)]
pub struct TreeDocument {
    pub parents: Vec<usize>,
}

pub fn load_tree(path: &PathBuf) -> Result<tree::Adjacency, Box<dyn Error>> {
    let raw = fs::read_to_string(path)?;
    let doc: TreeDocument = serde_json::from_str(&raw)?;
    let adj = tree::adj_from_parents(&doc.parents);
    tree::assert_valid(&adj);
    Ok(adj)
}

#[derive(Debug, Serialize, Deserialize)]
struct SampleRecord {
    parents: Vec<usize>,
    phi: Vec<Vec<f64>>,
    llh: f64,
}

fn to_record(sample: &TreeSample) -> SampleRecord {
    let phi = sample
        .phi
        .rows()
        .into_iter()
        .map(|row| row.to_vec())
        .collect();
    SampleRecord {
        parents: tree::parent_vector(&sample.adj)[1..].to_vec(),
        phi,
        llh: sample.llh,
    }
}

/// Write the merged posterior as JSON, one record per sample with the tree
/// encoded as a parent vector.
pub fn write_results_json(path: &PathBuf, samples: &[TreeSample]) -> Result<(), Box<dyn Error>> {
    let records: Vec<SampleRecord> = samples.iter().map(to_record).collect();
    fs::write(path, serde_json::to_string(&records)?)?;
    Ok(())
}

/// Write a per-sample summary CSV: index, log-likelihood and the parent
/// vector joined with ';'.
pub fn write_summary_csv(path: &PathBuf, samples: &[TreeSample]) -> Result<(), Box<dyn Error>> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(["sample", "llh", "parents"])?;
    for (idx, sample) in samples.iter().enumerate() {
        let parents = tree::parent_vector(&sample.adj)[1..]
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<String>>()
            .join(";");
        wtr.write_record(&[idx.to_string(), sample.llh.to_string(), parents])?;
    }
    wtr.flush()?;
    Ok(())
}
