//! The scheduler: walks a [`Dag`] in topological order, dispatching ready
//! nodes to worker threads under a core/memory admission budget.
//!
//! Concurrency model: each node's work closure blocks (it waits on a
//! subprocess), so parallelism comes from running multiple independent
//! nodes' closures on separate threads at once. The budget is the one piece
//! of shared mutable state, and it is only touched on the scheduler thread —
//! workers communicate completion over a channel.

use std::sync::mpsc;
use std::thread;

use tracing::{debug, info, warn};

use crate::errors::{PipelineError, Result};

use super::graph::Dag;
use super::node::{NodeId, RunState};
use super::report::RunReport;

/// The admission budget: the sums of concurrently running nodes' core and
/// memory requests must stay within these bounds.
#[derive(Clone, Copy, Debug)]
pub struct Budget {
    /// Total concurrently schedulable cores.
    pub cores: usize,

    /// Total concurrently schedulable memory, in gigabytes.
    pub memory_gb: usize,
}

impl Budget {
    /// Creates a budget.
    pub fn new(cores: usize, memory_gb: usize) -> Self {
        Budget { cores, memory_gb }
    }
}

/// Executes every node in `dag` and returns a report of terminal states.
///
/// Guarantees:
///
/// * a node is dispatched only after all of its predecessors reach
///   `Succeeded`;
/// * a node whose predecessor reaches `Failed` or `Skipped` is marked
///   `Skipped` and never dispatched;
/// * a node whose declared output artifact already exists transitions
///   directly to `Succeeded` without dispatch (idempotent resume);
/// * a node whose declared input is missing at dispatch time fails without
///   dispatch;
/// * concurrently running core/memory requests never exceed the budget,
///   except that a node requesting more than the whole budget is admitted
///   alone rather than deadlocking.
///
/// Failures are recorded in the report, not returned: the only error from
/// this function is a structurally invalid graph.
pub fn execute(dag: &mut Dag, budget: &Budget) -> Result<RunReport> {
    dag.validate()?;

    let (tx, rx) = mpsc::channel::<(NodeId, Result<()>)>();
    let mut handles = Vec::new();
    let mut cores_in_use = 0;
    let mut memory_in_use = 0;
    let mut running = 0;

    loop {
        promote(dag);

        let mut settled_without_dispatch = false;
        for id in dag.ids() {
            let Some(node) = dag.get(&id) else { continue };
            if node.state() != RunState::Ready {
                continue;
            }

            // Idempotent resume: an existing output artifact stands in for a
            // successful run.
            if node.output.as_deref().map(|p| p.exists()).unwrap_or(false) {
                if let Some(node) = dag.get_mut(&id) {
                    info!(
                        "node `{}` output already exists; resuming as succeeded",
                        id
                    );
                    node.state = RunState::Succeeded;
                    settled_without_dispatch = true;
                }
                continue;
            }

            if let Some(missing) = node.inputs.iter().find(|p| !p.exists()).cloned() {
                if let Some(node) = dag.get_mut(&id) {
                    let error = PipelineError::MissingInput(missing);
                    warn!("node `{}` failed: {}", id, error);
                    node.state = RunState::Failed;
                    node.error = Some(error.to_string());
                    settled_without_dispatch = true;
                }
                continue;
            }

            let (cores, memory_gb) = (node.cores, node.memory_gb);
            let oversized = cores > budget.cores || memory_gb > budget.memory_gb;
            let fits = cores_in_use + cores <= budget.cores
                && memory_in_use + memory_gb <= budget.memory_gb;

            if fits || (oversized && running == 0) {
                let Some(node) = dag.get_mut(&id) else { continue };
                let work = node.work.take();
                node.state = RunState::Running;
                cores_in_use += cores;
                memory_in_use += memory_gb;
                running += 1;
                debug!(
                    "dispatching node `{}` ({} core(s), {} GB); in use: {}/{} cores, {}/{} GB",
                    id, cores, memory_gb, cores_in_use, budget.cores, memory_in_use, budget.memory_gb
                );

                let tx = tx.clone();
                handles.push(thread::spawn(move || {
                    let result = match work {
                        Some(f) => f(),
                        None => Ok(()),
                    };
                    // Receiver outlives all workers; a send failure only
                    // means the scheduler is already gone.
                    let _ = tx.send((id, result));
                }));
            }
        }

        if settled_without_dispatch {
            // Resume/failure transitions above may have unblocked (or
            // doomed) successors; re-evaluate before waiting on a worker.
            continue;
        }

        if running == 0 {
            break;
        }

        let Ok((id, result)) = rx.recv() else { break };
        if let Some(node) = dag.get_mut(&id) {
            cores_in_use -= node.cores;
            memory_in_use -= node.memory_gb;
            running -= 1;

            match result {
                Ok(()) => {
                    info!("node `{}` succeeded", id);
                    node.state = RunState::Succeeded;
                }
                Err(error) => {
                    warn!("node `{}` failed: {}", id, error);
                    node.state = RunState::Failed;
                    node.error = Some(error.to_string());
                }
            }
        }
    }

    for handle in handles {
        let _ = handle.join();
    }

    let mut report = RunReport::default();
    report.absorb(dag);
    Ok(report)
}

/// Promotes pending nodes whose predecessors have settled: all predecessors
/// `Succeeded` ⇒ `Ready`; any predecessor `Failed` or `Skipped` ⇒ `Skipped`.
/// Iterates to a fixpoint so skips propagate transitively.
fn promote(dag: &mut Dag) {
    loop {
        let mut transitions: Vec<(NodeId, RunState)> = Vec::new();

        for node in dag.iter() {
            if node.state() != RunState::Pending {
                continue;
            }

            let mut all_succeeded = true;
            let mut doomed = false;
            for pred in &node.predecessors {
                match dag.get(pred).map(|p| p.state()) {
                    Some(RunState::Succeeded) => {}
                    Some(RunState::Failed) | Some(RunState::Skipped) => {
                        doomed = true;
                        all_succeeded = false;
                    }
                    _ => all_succeeded = false,
                }
            }

            if doomed {
                transitions.push((node.id.clone(), RunState::Skipped));
            } else if all_succeeded {
                transitions.push((node.id.clone(), RunState::Ready));
            }
        }

        if transitions.is_empty() {
            break;
        }

        for (id, state) in transitions {
            if let Some(node) = dag.get_mut(&id) {
                if state == RunState::Skipped {
                    debug!("node `{}` skipped (failed or skipped predecessor)", id);
                }
                node.state = state;
            }
        }
    }
}

#[cfg(test)]
mod tests {

    use std::path::PathBuf;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use super::*;
    use crate::dag::node::{JobNode, Stage};

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("varflow-sched-{}-{}", std::process::id(), name))
    }

    #[test]
    pub fn test_topological_dispatch_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut dag = Dag::new();

        for (id, preds) in [("a", vec![]), ("b", vec!["a"]), ("c", vec!["b"])] {
            let order = Arc::clone(&order);
            let mut node = JobNode::new(id, Stage::Align).work(move || {
                order.lock().unwrap().push(id.to_string());
                Ok(())
            });
            for p in preds {
                node = node.predecessor(p);
            }
            dag.add(node).unwrap();
        }

        let report = execute(&mut dag, &Budget::new(4, 4)).unwrap();
        assert!(report.is_success());
        assert_eq!(*order.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    pub fn test_failure_skips_transitive_successors_but_not_siblings() {
        let sibling_ran = Arc::new(AtomicBool::new(false));
        let mut dag = Dag::new();

        dag.add(
            JobNode::new("s1.align", Stage::Align)
                .work(|| Err(PipelineError::Configuration("boom".into()))),
        )
        .unwrap();
        dag.add(
            JobNode::new("s1.merge", Stage::Merge)
                .predecessor("s1.align")
                .work(|| Ok(())),
        )
        .unwrap();
        dag.add(
            JobNode::new("s1.annotate", Stage::Annotate)
                .predecessor("s1.merge")
                .work(|| Ok(())),
        )
        .unwrap();

        let flag = Arc::clone(&sibling_ran);
        dag.add(JobNode::new("s2.align", Stage::Align).work(move || {
            flag.store(true, Ordering::SeqCst);
            Ok(())
        }))
        .unwrap();

        let report = execute(&mut dag, &Budget::new(4, 4)).unwrap();

        assert_eq!(dag.get("s1.align").unwrap().state(), RunState::Failed);
        assert_eq!(dag.get("s1.merge").unwrap().state(), RunState::Skipped);
        assert_eq!(dag.get("s1.annotate").unwrap().state(), RunState::Skipped);
        assert_eq!(dag.get("s2.align").unwrap().state(), RunState::Succeeded);
        assert!(sibling_ran.load(Ordering::SeqCst));
        assert_eq!(report.count(RunState::Skipped), 2);
    }

    #[test]
    pub fn test_merge_requires_every_fan_out_predecessor() {
        let mut dag = Dag::new();

        dag.add(
            JobNode::new("s.callerA", Stage::VariantCall("callerA".into())).work(|| Ok(())),
        )
        .unwrap();
        dag.add(
            JobNode::new("s.callerB", Stage::VariantCall("callerB".into()))
                .work(|| Err(PipelineError::Configuration("caller died".into()))),
        )
        .unwrap();
        dag.add(
            JobNode::new("s.merge", Stage::Merge)
                .predecessor("s.callerA")
                .predecessor("s.callerB")
                .work(|| Ok(())),
        )
        .unwrap();

        execute(&mut dag, &Budget::new(4, 4)).unwrap();

        assert_eq!(dag.get("s.callerA").unwrap().state(), RunState::Succeeded);
        assert_eq!(dag.get("s.callerB").unwrap().state(), RunState::Failed);
        assert_eq!(dag.get("s.merge").unwrap().state(), RunState::Skipped);
    }

    #[test]
    pub fn test_idempotent_resume_skips_the_work() {
        let output = scratch("resume.out");
        std::fs::write(&output, b"already here").unwrap();

        let invoked = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&invoked);

        let mut dag = Dag::new();
        dag.add(
            JobNode::new("s.align", Stage::Align)
                .output(&output)
                .work(move || {
                    flag.store(true, Ordering::SeqCst);
                    Ok(())
                }),
        )
        .unwrap();

        let report = execute(&mut dag, &Budget::new(1, 1)).unwrap();

        assert!(report.is_success());
        assert!(!invoked.load(Ordering::SeqCst));
        std::fs::remove_file(output).ok();
    }

    #[test]
    pub fn test_missing_input_fails_without_dispatch() {
        let invoked = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&invoked);

        let mut dag = Dag::new();
        dag.add(
            JobNode::new("s.readgroup", Stage::Readgroup)
                .input(scratch("never-created.bam"))
                .work(move || {
                    flag.store(true, Ordering::SeqCst);
                    Ok(())
                }),
        )
        .unwrap();

        execute(&mut dag, &Budget::new(1, 1)).unwrap();

        let node = dag.get("s.readgroup").unwrap();
        assert_eq!(node.state(), RunState::Failed);
        assert!(node.error().unwrap().contains("missing input file"));
        assert!(!invoked.load(Ordering::SeqCst));
    }

    #[test]
    pub fn test_budget_admission_bounds_concurrency() {
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut dag = Dag::new();
        for i in 0..6 {
            let current = Arc::clone(&current);
            let peak = Arc::clone(&peak);
            dag.add(JobNode::new(format!("n{}", i), Stage::Align).work(move || {
                let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(25));
                current.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            }))
            .unwrap();
        }

        let report = execute(&mut dag, &Budget::new(2, 8)).unwrap();

        assert!(report.is_success());
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    pub fn test_oversized_request_runs_alone() {
        let mut dag = Dag::new();
        dag.add(JobNode::new("big", Stage::Align).cores(64).work(|| Ok(())))
            .unwrap();
        dag.add(JobNode::new("small", Stage::Align).work(|| Ok(())))
            .unwrap();

        let report = execute(&mut dag, &Budget::new(2, 2)).unwrap();
        assert!(report.is_success());
    }
}
