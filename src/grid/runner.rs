//! Grid bot runner - repeats grid cycles for one bot instance

use std::sync::Arc;

use log::{error, info, warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::config::{GridConfig, PollingConfig};
use super::cycle::GridCycle;
use super::errors::GridResult;
use super::executor::BrokerConnector;
use super::types::{BotReport, CyclePhase, StopReason};

/// Runs `cycle_count` grid cycles in sequence for one (symbol, parameters) pair
pub struct BotRunner<C: BrokerConnector + ?Sized> {
    name: String,
    config: GridConfig,
    polling: PollingConfig,
    connector: Arc<C>,
}

impl<C: BrokerConnector + ?Sized + 'static> BotRunner<C> {
    /// Create a runner, rejecting invalid configuration before anything starts
    pub fn new(
        name: impl Into<String>,
        config: GridConfig,
        polling: PollingConfig,
        connector: Arc<C>,
    ) -> GridResult<Self> {
        config.validate()?;
        Ok(Self {
            name: name.into(),
            config,
            polling,
            connector,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run every cycle, checking `stop` between cycles and during cool-down
    pub async fn run(&self, mut stop: watch::Receiver<bool>) -> BotReport {
        info!(
            "[{}] Launching grid bot on {}: {} levels/side x {} lots, TP {}%, {} cycles, {}s delay",
            self.name,
            self.config.symbol,
            self.config.level_count,
            self.config.volume,
            self.config.take_profit_pct,
            self.config.cycle_count,
            self.config.inter_cycle_delay_seconds
        );

        let mut cycles = Vec::with_capacity(self.config.cycle_count as usize);
        let mut stop_reason = StopReason::Completed;

        for cycle in 1..=self.config.cycle_count {
            if *stop.borrow() {
                stop_reason = StopReason::StopRequested;
                break;
            }

            let grid = GridCycle::new(&self.name, &self.config, &self.polling, self.connector.as_ref());
            match grid.run(cycle).await {
                Ok(report) => cycles.push(report),
                Err(e) => {
                    error!("[{}] Cycle {} failed, stopping bot: {}", self.name, cycle, e);
                    stop_reason = StopReason::Failed(e.to_string());
                    break;
                }
            }

            if self.cool_down(&mut stop).await && cycle < self.config.cycle_count {
                stop_reason = StopReason::StopRequested;
                break;
            }
        }

        info!(
            "[{}] Bot finished after {} cycles: {:?}",
            self.name,
            cycles.len(),
            stop_reason
        );

        BotReport {
            name: self.name.clone(),
            symbol: self.config.symbol.clone(),
            cycles,
            stop_reason,
        }
    }

    /// Sleep the inter-cycle delay; `true` if a stop request cut it short
    async fn cool_down(&self, stop: &mut watch::Receiver<bool>) -> bool {
        info!(
            "[{}] {:?}: waiting {} seconds",
            self.name,
            CyclePhase::CoolingDown,
            self.config.inter_cycle_delay_seconds
        );

        tokio::select! {
            _ = tokio::time::sleep(self.config.inter_cycle_delay()) => false,
            _ = stop_requested(stop) => {
                warn!("[{}] Stop requested during cool-down", self.name);
                true
            }
        }
    }

    /// Move the runner onto its own task
    pub fn spawn(self) -> BotHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let name = self.name.clone();
        let task = tokio::spawn(async move { self.run(stop_rx).await });
        BotHandle {
            name,
            stop_tx,
            task,
        }
    }
}

/// Resolves once a stop is requested; never resolves if the handle is gone
async fn stop_requested(stop: &mut watch::Receiver<bool>) {
    if stop.wait_for(|requested| *requested).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Validate and launch a bot on its own task
pub fn spawn_bot<C: BrokerConnector + ?Sized + 'static>(
    name: impl Into<String>,
    config: GridConfig,
    polling: PollingConfig,
    connector: Arc<C>,
) -> GridResult<BotHandle> {
    Ok(BotRunner::new(name, config, polling, connector)?.spawn())
}

/// Lifecycle handle of a spawned bot
pub struct BotHandle {
    name: String,
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<BotReport>,
}

impl BotHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ask the bot to stop at the next cycle boundary
    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the bot to finish and collect its report
    pub async fn join(self) -> GridResult<BotReport> {
        Ok(self.task.await?)
    }
}
