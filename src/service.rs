//! Actor front-end for a learning context.
//!
//! One task owns the context; callers talk to it through a cloneable
//! [`LearningHandle`]. Commands are applied strictly in arrival order.
//! Dropping every handle ends the task and returns the context.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::adaptation::{LearningSummary, RegimeShiftOutcome, TrainingOutcome};
use crate::context::{ContextSnapshot, DecayReport, LearningContext, Observation};
use crate::error::{LearningError, Result};
use crate::logging::{log, obj, v_num, Domain, Level};
use crate::memory::{MemoryHealth, PrioritizedEntry, SamplingStrategy};
use crate::snapshot::{StateSnapshot, TradeResult};
use crate::weights::WeightKey;

pub const DEFAULT_QUEUE: usize = 64;

#[derive(Debug)]
pub enum Command {
    TrainTrade {
        trade: Box<TradeResult>,
        reply: oneshot::Sender<TrainingOutcome>,
    },
    RegimeShift {
        old: String,
        new: String,
        successful: bool,
        reply: oneshot::Sender<RegimeShiftOutcome>,
    },
    Observe {
        state: Box<StateSnapshot>,
        reply: oneshot::Sender<Observation>,
    },
    DecayTick {
        reply: oneshot::Sender<DecayReport>,
    },
    Mutate {
        reply: oneshot::Sender<Vec<WeightKey>>,
    },
    Sample {
        n: usize,
        strategy: SamplingStrategy,
        reply: oneshot::Sender<Vec<PrioritizedEntry>>,
    },
    Summary {
        reply: oneshot::Sender<LearningSummary>,
    },
    Health {
        reply: oneshot::Sender<MemoryHealth>,
    },
    Export {
        reply: oneshot::Sender<ContextSnapshot>,
    },
    Import {
        snapshot: Box<ContextSnapshot>,
        reply: oneshot::Sender<Result<()>>,
    },
}

pub struct LearningService {
    ctx: LearningContext,
    rx: mpsc::Receiver<Command>,
}

impl LearningService {
    /// Spawn the actor on the current runtime.
    pub fn spawn(ctx: LearningContext, queue: usize) -> (LearningHandle, JoinHandle<LearningContext>) {
        let (tx, rx) = mpsc::channel(queue.max(1));
        let service = Self { ctx, rx };
        let task = tokio::spawn(service.run());
        (LearningHandle { tx }, task)
    }

    async fn run(mut self) -> LearningContext {
        let mut handled = 0u64;
        while let Some(cmd) = self.rx.recv().await {
            self.handle(cmd);
            handled += 1;
        }
        log(
            Level::Info,
            Domain::System,
            "learning_service_stopped",
            obj(&[("commands", v_num(handled as f64))]),
        );
        self.ctx
    }

    // A dropped reply receiver only means the caller stopped waiting.
    fn handle(&mut self, cmd: Command) {
        let ctx = &mut self.ctx;
        match cmd {
            Command::TrainTrade { trade, reply } => {
                let _ = reply.send(ctx.train_on_closed_trade(&trade));
            }
            Command::RegimeShift {
                old,
                new,
                successful,
                reply,
            } => {
                let _ = reply.send(ctx.train_on_regime_shift(&old, &new, successful));
            }
            Command::Observe { state, reply } => {
                let _ = reply.send(ctx.observe_snapshot(*state));
            }
            Command::DecayTick { reply } => {
                let _ = reply.send(ctx.decay_tick());
            }
            Command::Mutate { reply } => {
                let _ = reply.send(ctx.mutate_weights());
            }
            Command::Sample { n, strategy, reply } => {
                let _ = reply.send(ctx.sample(n, strategy));
            }
            Command::Summary { reply } => {
                let _ = reply.send(ctx.summary());
            }
            Command::Health { reply } => {
                let _ = reply.send(ctx.health());
            }
            Command::Export { reply } => {
                let _ = reply.send(ctx.export());
            }
            Command::Import { snapshot, reply } => {
                let _ = reply.send(ctx.import(*snapshot));
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct LearningHandle {
    tx: mpsc::Sender<Command>,
}

impl LearningHandle {
    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(build(reply))
            .await
            .map_err(|_| LearningError::ServiceStopped)?;
        rx.await.map_err(|_| LearningError::ServiceStopped)
    }

    pub async fn train_on_closed_trade(&self, trade: TradeResult) -> Result<TrainingOutcome> {
        self.request(|reply| Command::TrainTrade {
            trade: Box::new(trade),
            reply,
        })
        .await
    }

    pub async fn train_on_regime_shift(
        &self,
        old: &str,
        new: &str,
        successful: bool,
    ) -> Result<RegimeShiftOutcome> {
        self.request(|reply| Command::RegimeShift {
            old: old.to_string(),
            new: new.to_string(),
            successful,
            reply,
        })
        .await
    }

    pub async fn observe_snapshot(&self, state: StateSnapshot) -> Result<Observation> {
        self.request(|reply| Command::Observe {
            state: Box::new(state),
            reply,
        })
        .await
    }

    pub async fn decay_tick(&self) -> Result<DecayReport> {
        self.request(|reply| Command::DecayTick { reply }).await
    }

    pub async fn mutate_weights(&self) -> Result<Vec<WeightKey>> {
        self.request(|reply| Command::Mutate { reply }).await
    }

    pub async fn sample(&self, n: usize, strategy: SamplingStrategy) -> Result<Vec<PrioritizedEntry>> {
        self.request(|reply| Command::Sample { n, strategy, reply })
            .await
    }

    pub async fn summary(&self) -> Result<LearningSummary> {
        self.request(|reply| Command::Summary { reply }).await
    }

    pub async fn health(&self) -> Result<MemoryHealth> {
        self.request(|reply| Command::Health { reply }).await
    }

    pub async fn export(&self) -> Result<ContextSnapshot> {
        self.request(|reply| Command::Export { reply }).await
    }

    pub async fn import(&self, snapshot: ContextSnapshot) -> Result<()> {
        self.request(|reply| Command::Import {
            snapshot: Box::new(snapshot),
            reply,
        })
        .await?
    }
}
