use serde::Serialize;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info, info_span, warn};
use uuid::Uuid;

use super::{Task, TaskContext, TaskReport};
use crate::config::Config;
use crate::constants::FINGERPRINTS_FILE;
use crate::error::{DataError, Result};
use crate::idempotency::{compute_task_fingerprint, FingerprintManifest};
use crate::metrics;
use crate::normalize;
use crate::registry::{Mode, RegistryStore};

/// Result of a complete run
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub executed: Vec<TaskReport>,
    /// Tasks whose inputs were unchanged since their last success
    pub skipped: Vec<String>,
}

/// Declaration of one task for an external scheduler
#[derive(Debug, Serialize)]
pub struct TaskManifest {
    pub name: String,
    pub task_deps: Vec<String>,
    pub file_deps: Vec<PathBuf>,
    pub targets: Vec<PathBuf>,
    pub registries: Vec<RegistryUse>,
}

#[derive(Debug, Serialize)]
pub struct RegistryUse {
    pub name: String,
    pub key: Vec<String>,
    pub mode: Mode,
}

pub struct Orchestrator {
    config: Config,
    store: RegistryStore,
    tasks: Vec<Box<dyn Task>>,
}

impl Orchestrator {
    pub fn new(config: Config) -> Self {
        let store = RegistryStore::new(&config.paths.references_dir);
        Self {
            config,
            store,
            tasks: Vec::new(),
        }
    }

    /// Orchestrator with every entity normalizer registered
    pub fn standard(config: Config) -> Self {
        let mut orchestrator = Self::new(config);
        for task in normalize::standard_tasks() {
            orchestrator.register(task);
        }
        orchestrator
    }

    pub fn register(&mut self, task: Box<dyn Task>) {
        self.tasks.push(task);
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn task_names(&self) -> Vec<&'static str> {
        self.tasks.iter().map(|t| t.name()).collect()
    }

    /// Topological order of the selected tasks and everything they depend on.
    ///
    /// An empty selection means every task. Among tasks ready at the same time,
    /// declaration order wins, so the order is deterministic.
    pub fn execution_order(&self, selection: &[String]) -> Result<Vec<&'static str>> {
        let index: HashMap<&str, usize> = self
            .tasks
            .iter()
            .enumerate()
            .map(|(i, t)| (t.name(), i))
            .collect();

        for task in &self.tasks {
            for dep in task.task_deps() {
                if !index.contains_key(dep) {
                    return Err(DataError::UnknownTask(format!(
                        "{} (dependency of {})",
                        dep,
                        task.name()
                    )));
                }
            }
        }

        // Selected tasks plus their transitive dependencies
        let mut wanted = BTreeSet::new();
        let mut queue: VecDeque<usize> = if selection.is_empty() {
            (0..self.tasks.len()).collect()
        } else {
            selection
                .iter()
                .map(|name| {
                    index
                        .get(name.as_str())
                        .copied()
                        .ok_or_else(|| DataError::UnknownTask(name.clone()))
                })
                .collect::<Result<_>>()?
        };
        while let Some(i) = queue.pop_front() {
            if wanted.insert(i) {
                queue.extend(self.tasks[i].task_deps().iter().map(|d| index[d]));
            }
        }

        // Kahn's algorithm restricted to the wanted set
        let mut pending: HashMap<usize, usize> = wanted
            .iter()
            .map(|&i| (i, self.tasks[i].task_deps().len()))
            .collect();
        let mut order = Vec::with_capacity(wanted.len());
        let mut done = BTreeSet::new();

        while order.len() < wanted.len() {
            let ready = wanted
                .iter()
                .copied()
                .find(|i| !done.contains(i) && pending.get(i) == Some(&0));
            let Some(next) = ready else {
                let stuck: Vec<String> = wanted
                    .iter()
                    .filter(|i| !done.contains(*i))
                    .map(|&i| self.tasks[i].name().to_string())
                    .collect();
                return Err(DataError::DependencyCycle(stuck));
            };

            done.insert(next);
            order.push(self.tasks[next].name());
            let finished = self.tasks[next].name();
            for &i in &wanted {
                if self.tasks[i].task_deps().contains(&finished) {
                    if let Some(count) = pending.get_mut(&i) {
                        *count -= 1;
                    }
                }
            }
        }

        Ok(order)
    }

    /// Run the selected tasks in dependency order; the first failure aborts the run
    pub fn run(&self, selection: &[String], force: bool) -> Result<RunReport> {
        let run_id = Uuid::new_v4().to_string();
        let span = info_span!("run", run_id = %run_id);
        let _enter = span.enter();

        let order = self.execution_order(selection)?;
        info!("🚀 Starting run of {} tasks: {}", order.len(), order.join(", "));

        let ctx = TaskContext::new(&self.config, &self.store);
        let mut manifest =
            FingerprintManifest::load(&self.config.paths.output_dir.join(FINGERPRINTS_FILE))?;
        let mut report = RunReport {
            run_id,
            executed: Vec::new(),
            skipped: Vec::new(),
        };

        for name in order {
            let task = self.task(name)?;
            let task_span = info_span!("task", task = name);
            let _task_enter = task_span.enter();

            if !force {
                let fingerprint = self.fingerprint(task)?;
                if manifest.get(name) == Some(fingerprint.as_str()) {
                    info!("⏭️  {} is up to date", name);
                    metrics::tasks::skipped(name);
                    report.skipped.push(name.to_string());
                    continue;
                }
            }

            let t0 = Instant::now();
            match task.run(&ctx) {
                Ok(task_report) => {
                    let secs = t0.elapsed().as_secs_f64();
                    metrics::tasks::success(name, secs);
                    info!("✅ {} done in {:.2}s", name, secs);
                    manifest.record(name, self.fingerprint(task)?);
                    manifest.save()?;
                    report.executed.push(task_report);
                }
                Err(e) => {
                    metrics::tasks::failure(name);
                    error!("❌ {} failed: {}", name, e);
                    manifest.forget(name);
                    if let Err(save_err) = manifest.save() {
                        warn!("Could not update fingerprints after failure: {}", save_err);
                    }
                    return Err(e);
                }
            }
        }

        info!(
            "🏁 Run finished: {} executed, {} up to date",
            report.executed.len(),
            report.skipped.len()
        );
        Ok(report)
    }

    /// Declarations of every task, in registration order
    pub fn describe(&self) -> Vec<TaskManifest> {
        self.tasks
            .iter()
            .map(|task| TaskManifest {
                name: task.name().to_string(),
                task_deps: task.task_deps().iter().map(|d| d.to_string()).collect(),
                file_deps: task.file_deps(&self.config),
                targets: task.targets(&self.config),
                registries: task
                    .registries()
                    .into_iter()
                    .map(|(spec, mode)| RegistryUse {
                        name: spec.name.to_string(),
                        key: spec.key.iter().map(|k| k.to_string()).collect(),
                        mode,
                    })
                    .collect(),
            })
            .collect()
    }

    fn task(&self, name: &str) -> Result<&dyn Task> {
        self.tasks
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
            .ok_or_else(|| DataError::UnknownTask(name.to_string()))
    }

    fn fingerprint(&self, task: &dyn Task) -> Result<String> {
        let stores: Vec<PathBuf> = task
            .registries()
            .iter()
            .map(|(spec, _)| self.store.path(spec.name))
            .collect();
        compute_task_fingerprint(
            task.name(),
            &task.file_deps(&self.config),
            &stores,
            &task.targets(&self.config),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RegistrySpec;
    use std::cell::Cell as Counter;
    use std::rc::Rc;

    struct FakeTask {
        name: &'static str,
        deps: &'static [&'static str],
        runs: Rc<Counter<usize>>,
        fail: bool,
    }

    impl FakeTask {
        fn boxed(name: &'static str, deps: &'static [&'static str]) -> Box<dyn Task> {
            Box::new(FakeTask {
                name,
                deps,
                runs: Rc::new(Counter::new(0)),
                fail: false,
            })
        }
    }

    impl Task for FakeTask {
        fn name(&self) -> &'static str {
            self.name
        }

        fn task_deps(&self) -> &'static [&'static str] {
            self.deps
        }

        fn file_deps(&self, config: &Config) -> Vec<PathBuf> {
            vec![config.source_path(&format!("{}.csv", self.name))]
        }

        fn targets(&self, _config: &Config) -> Vec<PathBuf> {
            Vec::new()
        }

        fn registries(&self) -> Vec<(RegistrySpec, Mode)> {
            Vec::new()
        }

        fn run(&self, _ctx: &TaskContext) -> Result<TaskReport> {
            self.runs.set(self.runs.get() + 1);
            if self.fail {
                return Err(DataError::malformed(self.name, 2, "boom"));
            }
            Ok(TaskReport {
                task: self.name.to_string(),
                tables: Vec::new(),
                ids_allocated: 0,
                rows_filtered: 0,
            })
        }
    }

    fn orchestrator(tasks: Vec<Box<dyn Task>>) -> (tempfile::TempDir, Orchestrator) {
        let dir = tempfile::tempdir().unwrap();
        let mut o = Orchestrator::new(Config::rooted_at(dir.path()));
        for t in tasks {
            o.register(t);
        }
        (dir, o)
    }

    #[test]
    fn test_dependencies_come_first() {
        let (_dir, o) = orchestrator(vec![
            FakeTask::boxed("communes", &["departements", "epci"]),
            FakeTask::boxed("epci", &[]),
            FakeTask::boxed("departements", &["regions"]),
            FakeTask::boxed("regions", &[]),
        ]);
        let order = o.execution_order(&[]).unwrap();
        assert_eq!(order, vec!["epci", "regions", "departements", "communes"]);
    }

    #[test]
    fn test_selection_pulls_in_dependencies_only() {
        let (_dir, o) = orchestrator(vec![
            FakeTask::boxed("regions", &[]),
            FakeTask::boxed("departements", &["regions"]),
            FakeTask::boxed("epci", &[]),
        ]);
        let order = o.execution_order(&["departements".to_string()]).unwrap();
        assert_eq!(order, vec!["regions", "departements"]);
    }

    #[test]
    fn test_cycle_is_a_configuration_error() {
        let (_dir, o) = orchestrator(vec![
            FakeTask::boxed("a", &["b"]),
            FakeTask::boxed("b", &["a"]),
            FakeTask::boxed("c", &[]),
        ]);
        match o.execution_order(&[]) {
            Err(DataError::DependencyCycle(tasks)) => assert_eq!(tasks, vec!["a", "b"]),
            other => panic!("expected a cycle, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_unknown_tasks_are_rejected() {
        let (_dir, o) = orchestrator(vec![FakeTask::boxed("a", &["ghost"])]);
        assert!(matches!(o.execution_order(&[]), Err(DataError::UnknownTask(_))));

        let (_dir, o) = orchestrator(vec![FakeTask::boxed("a", &[])]);
        assert!(matches!(
            o.execution_order(&["b".to_string()]),
            Err(DataError::UnknownTask(_))
        ));
    }

    #[test]
    fn test_unchanged_task_is_skipped_unless_forced() {
        let runs = Rc::new(Counter::new(0));
        let task = FakeTask {
            name: "epci",
            deps: &[],
            runs: Rc::clone(&runs),
            fail: false,
        };
        let (_dir, o) = orchestrator(vec![Box::new(task)]);

        let first = o.run(&[], false).unwrap();
        assert_eq!(first.executed.len(), 1);
        let second = o.run(&[], false).unwrap();
        assert_eq!(second.skipped, vec!["epci"]);
        o.run(&[], true).unwrap();
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn test_first_failure_aborts_the_run() {
        let later = Rc::new(Counter::new(0));
        let (_dir, o) = orchestrator(vec![
            Box::new(FakeTask {
                name: "regions",
                deps: &[],
                runs: Rc::new(Counter::new(0)),
                fail: true,
            }),
            Box::new(FakeTask {
                name: "departements",
                deps: &["regions"],
                runs: Rc::clone(&later),
                fail: false,
            }),
        ]);
        assert!(o.run(&[], false).is_err());
        assert_eq!(later.get(), 0);
    }
}
