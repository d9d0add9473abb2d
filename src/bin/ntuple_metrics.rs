//! Dumps a sink's and a source's metrics snapshots as JSON.
//!
//! The core has no CLI surface of its own; this is ambient ops tooling
//! only, exercising the library the way a long-running writer/reader
//! process would so an operator can `ntuple_metrics` a running instance's
//! `/proc/<pid>` equivalent — in this single-process demo, it just drives a
//! tiny in-memory sink/source pass and prints each instance's own counters.

use std::sync::Arc;

use ntuple_kvstore::config::{ReaderOptions, WriterOptions};
use ntuple_kvstore::descriptor::{ColumnInfo, DatasetModel};
use ntuple_kvstore::kvstore::mem::MemKvDriver;
use ntuple_kvstore::kvstore::KvDriver;
use ntuple_kvstore::page::PageAllocator;
use ntuple_kvstore::sink::Sink;
use ntuple_kvstore::source::Source;

fn main() {
    env_logger::init();

    let driver: Arc<dyn KvDriver> = Arc::new(MemKvDriver::default());
    let uri = "kv://demo/metrics";

    let sink = Sink::create(uri, driver.clone(), WriterOptions::default().with_compression_level(3))
        .expect("create sink");
    let mut model = DatasetModel::new(vec![ColumnInfo { column_id: 0, element_size: 4 }]);

    let page = PageAllocator::new_page(0, 4, 16).expect("allocate page");
    let locator = sink.commit_page(0, &page).expect("commit page");
    model.record_page(0, locator, 16);
    sink.commit_cluster(16);
    let page_list = model.seal_cluster_group();
    let cg = sink
        .commit_cluster_group(&page_list)
        .expect("commit cluster group");
    model.register_cluster_group(cg.position, cg, page_list.len() as u64, vec![0]);
    sink.commit_dataset(&model.serialized_header(), &model.serialized_footer())
        .expect("commit dataset");

    let source = Source::attach(uri, driver, ReaderOptions::default()).expect("attach source");
    source.populate_page(0, 0).expect("populate page");

    let sink_snap = sink.metrics().snapshot();
    let source_snap = source.metrics().snapshot();
    println!("sink:");
    println!("{}", serde_json::to_string_pretty(&sink_snap).expect("serialize snapshot"));
    println!("source:");
    println!("{}", serde_json::to_string_pretty(&source_snap).expect("serialize snapshot"));
}
