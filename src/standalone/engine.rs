use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::ops::AddAssign;

use anyhow::{Context, Result};
use bytes::Bytes;
use dashmap::DashMap;
use itertools::Itertools;
use rayon::prelude::*;
use tracing::{debug, info, info_span};

use crate::error::JobError;
use crate::standalone::input::{compute_splits, read_split, resolve_inputs};
use crate::standalone::Job;
use crate::*;

// types related to this engine
type BucketIndex = u32;
type Buckets = DashMap<BucketIndex, Vec<KeyValue>>;

/// Name of the marker file written once a job has finished.
pub const SUCCESS_MARKER: &str = "_SUCCESS";

/// Record counts for one stage, in the spirit of Hadoop's task counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Counters {
    pub map_input_records: u64,
    pub map_output_records: u64,
    pub combine_input_records: u64,
    pub combine_output_records: u64,
    pub reduce_input_groups: u64,
    pub reduce_input_records: u64,
    pub reduce_output_records: u64,
}

impl AddAssign for Counters {
    fn add_assign(&mut self, other: Self) {
        self.map_input_records += other.map_input_records;
        self.map_output_records += other.map_output_records;
        self.combine_input_records += other.combine_input_records;
        self.combine_output_records += other.combine_output_records;
        self.reduce_input_groups += other.reduce_input_groups;
        self.reduce_input_records += other.reduce_input_records;
        self.reduce_output_records += other.reduce_output_records;
    }
}

impl fmt::Display for Counters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "map in={} out={}, combine in={} out={}, reduce groups={} in={} out={}",
            self.map_input_records,
            self.map_output_records,
            self.combine_input_records,
            self.combine_output_records,
            self.reduce_input_groups,
            self.reduce_input_records,
            self.reduce_output_records,
        )
    }
}

/// Counters of every stage a job ran, in execution order.
#[derive(Debug, Default, Clone)]
pub struct JobReport {
    pub stages: Vec<(&'static str, Counters)>,
}

impl JobReport {
    pub fn stage(&self, name: &str) -> Option<&Counters> {
        self.stages
            .iter()
            .find(|(stage, _)| *stage == name)
            .map(|(_, counters)| counters)
    }
}

/// The reduce output of one stage, one entry per reduce bucket, ordered by
/// bucket index. Every bucket in `0..n_reduce` is present, even if empty.
pub type StageOutput = Vec<(BucketIndex, Vec<KeyValue>)>;

/// Sorts records by key and runs `combine_fn` over each run of equal keys.
/// The key of each run is kept.
fn combine_split(
    combine_fn: CombineFn,
    mut records: Vec<KeyValue>,
    counters: &mut Counters,
) -> Result<Vec<KeyValue>> {
    counters.combine_input_records += records.len() as u64;
    records.sort_by_key(KeyValue::key);
    let mut combined = Vec::new();
    for (key, value_group) in &records.into_iter().chunk_by(KeyValue::key) {
        let iter = value_group.map(KeyValue::into_value);
        let value = combine_fn(key.clone(), Box::new(iter))?;
        combined.push(KeyValue::new(key, value));
    }
    counters.combine_output_records += combined.len() as u64;
    Ok(combined)
}

/// Runs the map function (and the combiner, if enabled) over every split in
/// parallel, and shuffles the results into reduce buckets by key hash.
pub fn perform_map(
    splits: Vec<Vec<KeyValue>>,
    engine: &Workload,
    num_reduce_worker: u32,
    combine: bool,
) -> Result<(Buckets, Counters)> {
    let buckets: Buckets = Buckets::new();
    let map_func = engine.map_fn;
    let combine_func = engine.combine_fn.filter(|_| combine);

    let counters = splits
        .into_par_iter()
        .enumerate()
        .map(|(split_no, records)| -> Result<Counters> {
            let mut counters = Counters::default();
            let mut mapped = Vec::new();
            for input_kv in records {
                counters.map_input_records += 1;
                let items = map_func(input_kv)
                    .with_context(|| format!("{} map task {} failed", engine.name, split_no))?;
                for item in items {
                    mapped.push(item.with_context(|| {
                        format!("{} map task {} failed", engine.name, split_no)
                    })?);
                }
            }
            counters.map_output_records += mapped.len() as u64;

            let mapped = match combine_func {
                Some(combine_fn) => combine_split(combine_fn, mapped, &mut counters).with_context(
                    || format!("{} combine for split {} failed", engine.name, split_no),
                )?,
                None => mapped,
            };

            // Insert every record into a bucket according to the hashed
            // value of its key (mod # reducers)
            for KeyValue { key, value } in mapped {
                let bucket_no = ihash(&key) % num_reduce_worker;
                buckets
                    .entry(bucket_no)
                    .or_default()
                    .push(KeyValue { key, value });
            }
            Ok(counters)
        })
        .try_reduce(Counters::default, |mut acc, counters| {
            acc += counters;
            Ok(acc)
        })?;

    Ok((buckets, counters))
}

/// Groups each bucket by key and applies the reduce function once per key.
/// Buckets are reduced in parallel.
pub fn perform_reduce(
    engine: &Workload,
    num_reduce_worker: u32,
    buckets: Buckets,
) -> Result<(StageOutput, Counters)> {
    let reduce_func = engine.reduce_fn;

    let mut bkts = buckets.into_iter().collect::<Vec<_>>();
    // reducers that got no records still produce (empty) output
    for reduce_id in 0..num_reduce_worker {
        if !bkts.iter().any(|(id, _)| *id == reduce_id) {
            bkts.push((reduce_id, Vec::new()));
        }
    }

    let mut reduced = bkts
        .into_par_iter()
        .map(|(reduce_id, mut bkt)| -> Result<_> {
            let mut counters = Counters::default();
            counters.reduce_input_records = bkt.len() as u64;
            bkt.sort_by_key(KeyValue::key);

            // Iterate through the values associated with each key and apply reduce function.
            let mut out = Vec::new();
            for (key, value_group) in &bkt.into_iter().chunk_by(KeyValue::key) {
                counters.reduce_input_groups += 1;
                let iter = value_group.map(KeyValue::into_value);
                let kv = reduce_func(key, Box::new(iter)).with_context(|| {
                    format!("{} reduce task {} failed", engine.name, reduce_id)
                })?;
                out.push(kv);
            }
            counters.reduce_output_records = out.len() as u64;
            Ok((reduce_id, out, counters))
        })
        .collect::<Result<Vec<_>>>()?;
    reduced.sort_by_key(|(reduce_id, _, _)| *reduce_id);

    let mut counters = Counters::default();
    let mut output = StageOutput::with_capacity(reduced.len());
    for (reduce_id, out, bucket_counters) in reduced {
        counters += bucket_counters;
        output.push((reduce_id, out));
    }
    Ok((output, counters))
}

/// Runs one full map, shuffle, and reduce stage over the given splits.
pub fn run_stage(
    engine: &Workload,
    splits: Vec<Vec<KeyValue>>,
    n_reduce: u32,
    combine: bool,
) -> Result<(StageOutput, Counters)> {
    let span = info_span!("stage", name = engine.name);
    let _guard = span.enter();

    let num_reduce_worker = engine.reducers(n_reduce);
    info!(
        "starting: {} splits, {} reducers",
        splits.len(),
        num_reduce_worker
    );

    /*  The map logic carries out mapping and also shuffle. This makes sense in
     *  the case of a standalone system.
     */
    let (buckets, map_counters) = perform_map(splits, engine, num_reduce_worker, combine)?;
    debug!("shuffled into {} non-empty buckets", buckets.len());

    let (output, reduce_counters) = perform_reduce(engine, num_reduce_worker, buckets)?;

    let mut counters = map_counters;
    counters += reduce_counters;
    info!("finished: {}", counters);
    Ok((output, counters))
}

/// Runs `stages` back to back. Each reduce bucket of one stage becomes one
/// input split of the next. The output of the last stage is written to the
/// job's output directory.
pub fn run_job(job: &Job, stages: &[Workload]) -> Result<JobReport> {
    if job.output.exists() {
        return Err(JobError::OutputExists(job.output.clone()).into());
    }

    let files = resolve_inputs(&job.input)?;
    let input_splits = compute_splits(&files, job.split_size)?;
    info!(
        "{} input files, {} splits",
        files.len(),
        input_splits.len()
    );

    let mut splits = input_splits
        .par_iter()
        .map(|split| {
            read_split(split).with_context(|| {
                format!(
                    "reading split {}:{}+{}",
                    split.path.display(),
                    split.start,
                    split.end - split.start
                )
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut report = JobReport::default();
    let mut output = StageOutput::new();
    for engine in stages {
        let (stage_output, counters) = run_stage(engine, splits, job.n_reduce, job.combine)?;
        report.stages.push((engine.name, counters));
        splits = stage_output.iter().map(|(_, bkt)| bkt.clone()).collect();
        output = stage_output;
    }

    write_output(job, &output)?;
    Ok(report)
}

/// Writes one `mr-out-<reduce id>` file per bucket, each record as
/// `key \t value \n`, followed by the success marker.
pub fn write_output(job: &Job, output: &StageOutput) -> Result<()> {
    let output_dir = &job.output;
    fs::create_dir_all(output_dir)
        .with_context(|| format!("creating output directory {}", output_dir.display()))?;

    for (reduce_id, records) in output {
        let out_pathspec = output_dir.join(format!("mr-out-{}", reduce_id));
        let out_file = File::create(&out_pathspec)
            .with_context(|| format!("creating {}", out_pathspec.display()))?;
        let mut writer = BufWriter::new(out_file);
        for kv in records {
            write_record(&mut writer, &kv.key, &kv.value)?;
        }
        writer.flush()?;
        debug!("wrote {} records to {}", records.len(), out_pathspec.display());
    }

    File::create(output_dir.join(SUCCESS_MARKER))?;
    info!("output written to {}", output_dir.display());
    Ok(())
}

fn write_record<W: Write>(writer: &mut W, key: &Bytes, value: &Bytes) -> Result<()> {
    writer.write_all(key)?;
    writer.write_all(b"\t")?;
    writer.write_all(value)?;
    writer.write_all(b"\n")?;
    Ok(())
}
