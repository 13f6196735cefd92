use std::fs;
use std::path::PathBuf;

use svgbatch_common::common_config::CONFIG;
use svgbatch_common::{
    compress_ratio, is_svg_path, plan_jobs, prepare_size, prepare_time, sort_results, Job,
    JobQueue, ResultRecord, SortCriterion, StatisticsAggregator,
};

fn record(name: &str, input: u64, output: u64, ms: u64) -> ResultRecord {
    let job = Job::new(format!("in/{}", name), format!("out/{}", name));
    ResultRecord::cleaned(&job, input, output, ms)
}

fn record_with_ratio(name: &str, ratio: f64) -> ResultRecord {
    let mut r = record(name, 1000, (ratio * 10.0) as u64, 10);
    r.compress_ratio = ratio;
    r
}

#[test]
fn test_queue_hands_out_jobs_in_order() {
    let jobs: Vec<Job> = (0..3)
        .map(|i| Job::new(format!("in/{}.svg", i), format!("out/{}.svg", i)))
        .collect();
    let mut queue = JobQueue::new(jobs.clone());

    assert_eq!(queue.remaining(), 3);
    assert_eq!(queue.peek(), Some(&jobs[0]));
    assert_eq!(queue.next(), Some(jobs[0].clone()));
    assert_eq!(queue.next(), Some(jobs[1].clone()));
    assert_eq!(queue.dispatched(), 2);
    assert_eq!(queue.next(), Some(jobs[2].clone()));
    assert!(queue.is_exhausted());
    assert_eq!(queue.next(), None, "cursor must not run past the end");
    assert_eq!(queue.dispatched(), 3);
}

#[test]
fn test_queue_reset_rewinds_cursor() {
    let mut queue = JobQueue::new(vec![Job::new("a.svg", "b.svg")]);
    queue.next();
    assert!(queue.is_exhausted());

    queue.reset(vec![Job::new("c.svg", "d.svg"), Job::new("e.svg", "f.svg")]);
    assert_eq!(queue.dispatched(), 0);
    assert_eq!(queue.remaining(), 2);
    assert_eq!(queue.next().map(|j| j.input), Some(PathBuf::from("c.svg")));
}

#[test]
fn test_extrema_skip_outliers() {
    let mut agg = StatisticsAggregator::new();
    for (i, ratio) in [0.0, 45.0, 100.0, 60.0].into_iter().enumerate() {
        agg.record(&record_with_ratio(&format!("{}.svg", i), ratio));
    }
    let stats = agg.snapshot();

    assert_eq!(stats.compress_min, Some(45.0), "0% must not be the minimum");
    assert_eq!(stats.compress_max, Some(60.0), "100% must not be the maximum");
    assert_eq!(stats.completed_count, 4, "outliers still count");
    assert_eq!(stats.input_bytes_total, 4000);
}

#[test]
fn test_crashed_results_only_bump_counter() {
    let mut agg = StatisticsAggregator::new();
    agg.record(&record("a.svg", 1000, 400, 20));
    agg.record(&ResultRecord::crashed(&Job::new("b.svg", "o/b.svg"), 5000));
    let stats = agg.snapshot();

    assert_eq!(stats.completed_count, 1);
    assert_eq!(stats.crashed_count, 1);
    assert_eq!(stats.processed(), 2);
    assert_eq!(stats.input_bytes_total, 1000);
    assert_eq!(stats.output_bytes_total, 400);
    assert_eq!(stats.time_total, 20);
}

#[test]
fn test_averages_and_timing() {
    let mut agg = StatisticsAggregator::new();
    assert_eq!(agg.snapshot().average_time_ms(), None);
    assert_eq!(agg.snapshot().average_compression(), None);

    agg.record(&record("a.svg", 1000, 500, 10));
    agg.record(&record("b.svg", 3000, 1500, 30));
    let stats = agg.snapshot();

    assert_eq!(stats.time_min, Some(10));
    assert_eq!(stats.time_max, Some(30));
    assert_eq!(stats.average_time_ms(), Some(20));
    assert_eq!(stats.average_compression(), Some(50.0));
    assert_eq!(stats.best_reduction(), Some(50.0));

    agg.reset();
    assert_eq!(agg.snapshot().processed(), 0);
}

#[test]
fn test_compress_ratio_empty_input_is_no_reduction() {
    assert_eq!(compress_ratio(0, 0), 100.0);
    assert_eq!(compress_ratio(200, 50), 25.0);
}

#[test]
fn test_sort_is_stable_and_configurable() {
    let mut results = vec![
        record("B.svg", 100, 80, 5),
        record("a.svg", 100, 30, 5),
        record("c.svg", 100, 80, 1),
    ];

    sort_results(&mut results, SortCriterion::Name);
    let names: Vec<_> = results.iter().map(|r| r.output.clone()).collect();
    assert_eq!(
        names,
        vec![
            PathBuf::from("out/a.svg"),
            PathBuf::from("out/B.svg"),
            PathBuf::from("out/c.svg")
        ]
    );

    sort_results(&mut results, SortCriterion::Compression);
    assert_eq!(results[0].output, PathBuf::from("out/B.svg"), "ties keep prior order");
    assert_eq!(results[1].output, PathBuf::from("out/c.svg"));
    assert_eq!(results[2].output, PathBuf::from("out/a.svg"));

    sort_results(&mut results, SortCriterion::Time);
    assert_eq!(results[0].output, PathBuf::from("out/c.svg"));
}

#[test]
fn test_sort_criterion_parses() {
    assert_eq!("Size".parse::<SortCriterion>().unwrap(), SortCriterion::Size);
    assert_eq!("elements".parse::<SortCriterion>().unwrap(), SortCriterion::Elements);
    assert!("colour".parse::<SortCriterion>().is_err());
}

#[test]
fn test_formatting() {
    assert_eq!(prepare_size(512), "512 B");
    assert_eq!(prepare_size(1536), "1.50 KiB");
    assert_eq!(prepare_size(2 * 1024 * 1024), "2.00 MiB");
    assert_eq!(prepare_time(7), "007ms");
    assert_eq!(prepare_time(12_030), "12s 030ms");
    assert_eq!(prepare_time(185_000), "3m 05s");
}

#[test]
fn test_plan_jobs_mirrors_tree() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    fs::create_dir_all(input.path().join("icons/sub")).unwrap();
    fs::write(input.path().join("b.svg"), "<svg/>").unwrap();
    fs::write(input.path().join("icons/a.SVG"), "<svg/>").unwrap();
    fs::write(input.path().join("icons/sub/c.svgz"), [0x1f, 0x8b]).unwrap();
    fs::write(input.path().join("notes.txt"), "skip me").unwrap();

    let jobs = plan_jobs(input.path(), output.path()).unwrap();

    assert_eq!(jobs.len(), 3, "non-svg files are ignored");
    for job in &jobs {
        assert!(is_svg_path(&job.input));
        let rel_in = job.input.strip_prefix(input.path()).unwrap();
        let rel_out = job.output.strip_prefix(output.path()).unwrap();
        assert_eq!(rel_in, rel_out);
    }
    let mut sorted = jobs.clone();
    sorted.sort_by(|a, b| a.input.cmp(&b.input));
    assert_eq!(jobs, sorted);
}

#[test]
fn test_plan_jobs_rejects_file_input() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("one.svg");
    fs::write(&file, "<svg/>").unwrap();
    assert!(plan_jobs(&file, dir.path()).is_err());
}

#[test]
fn test_worker_count_clamped() {
    let max = CONFIG.max_worker_count;
    assert!(CONFIG.ideal_worker_count >= 1);
    assert_eq!(CONFIG.clamp_worker_count(0), 1);
    assert_eq!(CONFIG.clamp_worker_count(max + 10), max);
    assert_eq!(CONFIG.worker_count_or_ideal(None), CONFIG.ideal_worker_count);
}
