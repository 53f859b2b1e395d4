use crate::physics::PhysicsState;
use crossbeam_channel::{Receiver, Sender};
use std::io;
use std::num::NonZeroUsize;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::thread::JoinHandle;
use tracing::{debug, error, trace};

/// One simulation step handed to a worker. The state travels with the job and
/// comes back through `reply` once the step is done.
pub struct StepJob {
    pub state: Box<PhysicsState>,
    pub dt: f32,
    pub reply: Sender<Box<PhysicsState>>,
}

/// A fixed pool of threads that advance physics states.
///
/// Workers share one multi-consumer queue, so whichever worker is idle picks up
/// the next step. Dropping the pool closes the queue and joins every thread.
pub struct StepWorkers {
    jobs: Option<Sender<StepJob>>,
    threads: Vec<JoinHandle<()>>,
}

impl StepWorkers {
    /// Half the available hardware threads, but never fewer than two.
    pub fn recommended_threads() -> usize {
        let available = std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1);
        (available / 2).max(2)
    }

    pub fn spawn(count: usize) -> io::Result<Self> {
        let count = count.max(1);
        let (jobs, job_rx) = crossbeam_channel::unbounded::<StepJob>();

        let threads = (0..count)
            .map(|i| {
                let job_rx = job_rx.clone();
                std::thread::Builder::new()
                    .name(format!("physics-worker-{i}"))
                    .spawn(move || worker_loop(i, job_rx))
            })
            .collect::<io::Result<Vec<_>>>()?;

        debug!("Spawned {count} physics workers");

        Ok(StepWorkers {
            jobs: Some(jobs),
            threads,
        })
    }

    /// Queues a step. Hands the job back if no worker can take it anymore.
    pub fn dispatch(&self, job: StepJob) -> Result<(), StepJob> {
        match &self.jobs {
            Some(jobs) => jobs.send(job).map_err(|e| e.into_inner()),
            None => Err(job),
        }
    }

    pub fn thread_count(&self) -> usize {
        self.threads.len()
    }
}

fn worker_loop(index: usize, jobs: Receiver<StepJob>) {
    while let Ok(StepJob {
        mut state,
        dt,
        reply,
    }) = jobs.recv()
    {
        trace!("Worker {index} stepping by {dt}s");

        let stepped = catch_unwind(AssertUnwindSafe(move || {
            state.step(dt);
            state
        }));

        match stepped {
            Ok(state) => {
                if reply.send(state).is_err() {
                    debug!("Physics world went away before its step finished");
                }
            }
            Err(_) => error!("Physics worker {index} panicked during a step. The world is lost"),
        }
    }

    trace!("Physics worker {index} exited");
}

impl Drop for StepWorkers {
    fn drop(&mut self) {
        self.jobs.take();

        for thread in self.threads.drain(..) {
            if thread.join().is_err() {
                error!("A physics worker could not be joined");
            }
        }
    }
}
