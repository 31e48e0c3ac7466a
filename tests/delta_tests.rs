mod common;

use pretty_assertions::assert_eq;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tagindex::error::Result;
use tagindex::tags::RunStats;
use tagindex::*;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Op {
    Clear(PathBuf),
    Extract(PathBuf),
}

/// Records every mutation instead of performing it.
struct RecordingIndexer {
    present: HashSet<PathBuf>,
    failing: HashSet<PathBuf>,
    ops: Mutex<Vec<Op>>,
}

impl RecordingIndexer {
    fn new(present: &[&str]) -> Self {
        Self {
            present: present.iter().map(PathBuf::from).collect(),
            failing: HashSet::new(),
            ops: Mutex::new(Vec::new()),
        }
    }

    fn failing_on(mut self, path: &str) -> Self {
        self.failing.insert(PathBuf::from(path));
        self
    }

    fn ops(&self) -> Vec<Op> {
        self.ops.lock().expect("lock").clone()
    }
}

impl UnitIndexer for RecordingIndexer {
    fn contains(&self, path: &Path) -> bool {
        self.present.contains(path)
    }

    fn clear(&self, path: &Path) -> Result<()> {
        self.ops.lock().expect("lock").push(Op::Clear(path.to_path_buf()));
        Ok(())
    }

    fn extract(&self, path: &Path) -> Result<RunStats> {
        self.ops.lock().expect("lock").push(Op::Extract(path.to_path_buf()));
        if self.failing.contains(path) {
            return Err(IndexError::TagTool {
                command: "ctags".to_string(),
                status: "exit status: 1".to_string(),
            });
        }
        Ok(RunStats {
            records: 1,
            created: 1,
            ..RunStats::default()
        })
    }
}

fn filter() -> UnitFilter {
    UnitFilter::new().expect("filter")
}

fn folder(path: &str, children: Vec<DeltaNode>) -> DeltaNode {
    DeltaNode::changed(path)
        .with_content_changed(false)
        .with_children(children)
}

#[test]
fn each_unit_gets_exactly_its_operations() {
    let tree = folder(
        "/p",
        vec![
            DeltaNode::removed("/p/c.c"),
            folder(
                "/p/src",
                vec![DeltaNode::added("/p/src/b.c"), DeltaNode::changed("/p/src/a.c")],
            ),
            DeltaNode::changed("/p/touched.c").with_content_changed(false),
            DeltaNode::added("/p/README"),
        ],
    );
    let indexer = RecordingIndexer::new(&["/p/src/a.c", "/p/c.c", "/p/touched.c"]);

    let report = DeltaProcessor::new(&indexer).process(&tree, &filter());

    assert_eq!(
        indexer.ops(),
        vec![
            Op::Clear(PathBuf::from("/p/src/a.c")),
            Op::Extract(PathBuf::from("/p/src/a.c")),
            Op::Extract(PathBuf::from("/p/src/b.c")),
            Op::Clear(PathBuf::from("/p/c.c")),
        ]
    );
    assert_eq!(report.applied, 3);
    assert!(report.failed.is_empty());
    assert_eq!(report.stats.records, 2);
}

#[test]
fn added_unit_with_stale_data_is_cleared_first() {
    let delta = IndexDelta {
        changed: Vec::new(),
        added: vec![PathBuf::from("/p/a.c")],
        removed: Vec::new(),
    };
    let indexer = RecordingIndexer::new(&["/p/a.c"]);
    DeltaProcessor::new(&indexer).apply(&delta);
    assert_eq!(
        indexer.ops(),
        vec![
            Op::Clear(PathBuf::from("/p/a.c")),
            Op::Extract(PathBuf::from("/p/a.c")),
        ]
    );
}

#[test]
fn failing_unit_does_not_stop_the_delta() {
    let delta = IndexDelta {
        changed: vec![PathBuf::from("/p/bad.c"), PathBuf::from("/p/good.c")],
        added: Vec::new(),
        removed: vec![PathBuf::from("/p/old.c")],
    };
    let indexer = RecordingIndexer::new(&[]).failing_on("/p/bad.c");

    let report = DeltaProcessor::new(&indexer).apply(&delta);

    assert_eq!(report.applied, 2);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, PathBuf::from("/p/bad.c"));
    assert_eq!(
        indexer.ops(),
        vec![
            Op::Extract(PathBuf::from("/p/bad.c")),
            Op::Extract(PathBuf::from("/p/good.c")),
            Op::Clear(PathBuf::from("/p/old.c")),
        ]
    );
}

#[test]
fn empty_notification_does_nothing() {
    let indexer = RecordingIndexer::new(&[]);
    let report = DeltaProcessor::new(&indexer).process(&folder("/p", Vec::new()), &filter());
    assert_eq!(report.applied, 0);
    assert!(indexer.ops().is_empty());
}

#[cfg(unix)]
#[test]
fn tag_backed_delta_replaces_and_removes_unit_data() {
    use tagindex::delta::TagUnitIndexer;

    let temp = tempfile::tempdir().expect("tempdir");
    let tool = common::fake_tag_tool(temp.path());
    let roots = common::source_roots(temp.path(), 2);
    let first = roots[0].join("root0.c");
    let second = roots[1].join("root1.c");

    let fragment = TagFragment::new(FragmentId(0));
    let runner = TagRunner::new(&tool, temp.path().join("tags-0"));
    let indexer = TagUnitIndexer::new(&fragment, &runner);
    let processor = DeltaProcessor::new(&indexer);

    let report = processor.process(
        &folder(
            temp.path().to_str().expect("utf-8 path"),
            vec![DeltaNode::added(&first), DeltaNode::added(&second)],
        ),
        &filter(),
    );
    assert!(report.failed.is_empty(), "{:?}", report.failed);
    assert_eq!(fragment.binding_count(), 2);
    assert!(fragment.contains_path(&first));

    // Re-extracting a changed unit does not duplicate its bindings.
    processor.process(&DeltaNode::changed(&first), &filter());
    assert_eq!(fragment.binding_count(), 2);

    processor.process(&DeltaNode::removed(&second), &filter());
    assert_eq!(fragment.binding_count(), 1);
    assert!(!fragment.contains_path(&second));

    let view = fragment.read();
    assert_eq!(view.find_bindings("sym_root0").expect("lookup").len(), 1);
    assert!(view.find_bindings("sym_root1").expect("lookup").is_empty());
}
