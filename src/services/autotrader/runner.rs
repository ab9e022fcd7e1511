//! AutoTrader
//!
//! Runs the decision loop on a background task: analyze every watched
//! symbol, act on actionable signals, enforce stop-losses and record what
//! happened.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use tokio::sync::{broadcast, Notify};
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::decision::{analyze_asset, evaluate_signal};
use super::decision_log::DecisionLog;
use super::AutoTraderError;
use crate::services::portfolio::Portfolio;
use crate::types::{
    AnalysisResult, AutoTraderStatus, DecisionAction, PortfolioHealth, Position, TradeSignal,
    TradingDecision, TradingEvent, TradingPreferences,
};

/// Interval used when no preferences are set.
const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);
/// Decisions included in a status read.
const RECENT_DECISIONS: usize = 10;
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Loop bookkeeping, separate from the portfolio lock.
struct TraderState {
    preferences: Option<TradingPreferences>,
    running: bool,
    /// Bumped on every start so a stale task cannot clear a newer run
    run_id: u64,
    /// Set while a spawned loop task exists. `stop` only signals the task,
    /// so an iteration in flight keeps running until it returns.
    loop_active: bool,
    started_at: Option<i64>,
    loop_count: u64,
    last_loop_at: Option<i64>,
    last_analysis: HashMap<String, AnalysisResult>,
    decisions: DecisionLog,
    stop_tx: Option<broadcast::Sender<()>>,
}

/// Autonomous trading engine bound to one portfolio.
pub struct AutoTrader {
    portfolio: Arc<Portfolio>,
    state: RwLock<TraderState>,
    /// Wakes the loop when preferences change so the interval is rebuilt
    preferences_changed: Notify,
    event_tx: broadcast::Sender<TradingEvent>,
}

impl AutoTrader {
    pub fn new(portfolio: Arc<Portfolio>, decision_log_capacity: usize) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self::with_event_sender(portfolio, decision_log_capacity, event_tx)
    }

    /// Create a trader publishing on an existing event channel.
    pub fn with_event_sender(
        portfolio: Arc<Portfolio>,
        decision_log_capacity: usize,
        event_tx: broadcast::Sender<TradingEvent>,
    ) -> Self {
        Self {
            portfolio,
            state: RwLock::new(TraderState {
                preferences: None,
                running: false,
                run_id: 0,
                loop_active: false,
                started_at: None,
                loop_count: 0,
                last_loop_at: None,
                last_analysis: HashMap::new(),
                decisions: DecisionLog::new(decision_log_capacity),
                stop_tx: None,
            }),
            preferences_changed: Notify::new(),
            event_tx,
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, TraderState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, TraderState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn portfolio(&self) -> &Arc<Portfolio> {
        &self.portfolio
    }

    /// Subscribe to trade and profit-target events.
    pub fn subscribe(&self) -> broadcast::Receiver<TradingEvent> {
        self.event_tx.subscribe()
    }

    pub fn preferences(&self) -> Option<TradingPreferences> {
        self.read_state().preferences.clone()
    }

    /// Replace the preferences. A running loop picks up the new interval
    /// immediately and the new symbols on its next iteration.
    pub fn set_preferences(&self, preferences: TradingPreferences) {
        let interval = preferences.style.interval();
        self.write_state().preferences = Some(preferences);
        self.preferences_changed.notify_one();
        debug!("Auto-trader preferences updated, interval {:?}", interval);
    }

    pub fn is_running(&self) -> bool {
        self.read_state().running
    }

    /// Current loop interval, derived from the trading style.
    pub fn interval(&self) -> Duration {
        self.read_state()
            .preferences
            .as_ref()
            .map(|p| p.style.interval())
            .unwrap_or(DEFAULT_INTERVAL)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Start the loop on a background task. The first iteration runs
    /// immediately.
    pub fn start(self: &Arc<Self>) -> Result<(), AutoTraderError> {
        self.start_with_cancellation(std::future::pending::<()>())
    }

    /// Start the loop; it also ends when `cancel` completes. Cancellation
    /// marks the trader stopped without a call to [`AutoTrader::stop`].
    pub fn start_with_cancellation<F>(self: &Arc<Self>, cancel: F) -> Result<(), AutoTraderError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (run_id, stop_rx, assets, interval) = {
            let mut state = self.write_state();

            // A stopped run's in-flight iteration must finish before a new run starts
            if state.running || state.loop_active {
                return Err(AutoTraderError::AlreadyRunning);
            }
            let prefs = match state.preferences.as_ref() {
                Some(p) if !p.assets.is_empty() => p,
                _ => return Err(AutoTraderError::PreferencesNotSet),
            };
            if !prefs.auto_trade {
                return Err(AutoTraderError::AutoTradeDisabled);
            }
            let assets = prefs.assets.clone();
            let interval = prefs.style.interval();

            let (stop_tx, stop_rx) = broadcast::channel(1);
            state.running = true;
            state.run_id += 1;
            state.loop_active = true;
            state.started_at = Some(chrono::Utc::now().timestamp_millis());
            state.loop_count = 0;
            state.stop_tx = Some(stop_tx);

            (state.run_id, stop_rx, assets, interval)
        };

        info!("Auto-trading started, monitoring {:?} every {:?}", assets, interval);
        tokio::spawn(Arc::clone(self).run_loop(run_id, stop_rx, cancel));
        Ok(())
    }

    /// Stop the loop. Takes effect between iterations; until the loop task
    /// exits, `start` keeps returning [`AutoTraderError::AlreadyRunning`].
    pub fn stop(&self) -> Result<(), AutoTraderError> {
        let mut state = self.write_state();
        if !state.running {
            return Err(AutoTraderError::NotRunning);
        }

        state.running = false;
        if let Some(tx) = state.stop_tx.take() {
            let _ = tx.send(());
        }

        info!("Auto-trading stopped after {} loops", state.loop_count);
        Ok(())
    }

    async fn run_loop<F>(self: Arc<Self>, run_id: u64, mut stop_rx: broadcast::Receiver<()>, cancel: F)
    where
        F: Future<Output = ()> + Send,
    {
        tokio::pin!(cancel);
        let _exit = LoopExit {
            trader: Arc::clone(&self),
            run_id,
        };

        let mut period = self.interval();
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = &mut cancel => {
                    self.mark_cancelled(run_id);
                    break;
                }
                _ = stop_rx.recv() => {
                    debug!("Auto-trading loop received stop signal");
                    break;
                }
                _ = self.preferences_changed.notified() => {}
                _ = ticker.tick() => {
                    self.run_once().await;
                }
            }

            let next = self.interval();
            if next != period {
                debug!("Auto-trading interval changed: {:?} -> {:?}", period, next);
                period = next;
                ticker = interval_at(Instant::now() + period, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            }
        }
    }

    fn loop_exited(&self, run_id: u64) {
        let mut state = self.write_state();
        if state.run_id == run_id {
            state.loop_active = false;
            debug!("Auto-trading loop for run {} exited", run_id);
        }
    }

    fn mark_cancelled(&self, run_id: u64) {
        let mut state = self.write_state();
        if state.run_id == run_id && state.running {
            state.running = false;
            state.stop_tx = None;
            info!("Auto-trading cancelled after {} loops", state.loop_count);
        }
    }

    // =========================================================================
    // Iteration
    // =========================================================================

    /// Run one iteration inline.
    pub async fn run_once(&self) {
        let (loop_number, prefs) = {
            let mut state = self.write_state();
            state.loop_count += 1;
            state.last_loop_at = Some(chrono::Utc::now().timestamp_millis());
            (state.loop_count, state.preferences.clone())
        };

        let Some(prefs) = prefs else {
            debug!("Auto-trading loop #{} skipped: no preferences", loop_number);
            return;
        };

        info!("Auto-trading loop #{} starting", loop_number);

        if self.portfolio.health().await == PortfolioHealth::Stopped {
            warn!("Cannot trade - portfolio at floor limit, skipping loop #{}", loop_number);
            return;
        }

        for symbol in &prefs.assets {
            let decision = self.process_symbol(symbol, &prefs).await;
            self.record(decision);
        }

        self.check_exit_conditions().await;
        self.check_profit_target(&prefs).await;
        self.portfolio.record_snapshot().await;

        info!("Auto-trading loop #{} complete", loop_number);
    }

    async fn process_symbol(&self, symbol: &str, prefs: &TradingPreferences) -> TradingDecision {
        let now = chrono::Utc::now().timestamp_millis();

        let analysis = match analyze_asset(self.portfolio.market().as_ref(), symbol).await {
            Ok(analysis) => analysis,
            Err(e) => {
                error!("Failed to analyze {}: {}", symbol, e);
                return TradingDecision {
                    timestamp: now,
                    symbol: symbol.to_string(),
                    action: DecisionAction::Hold,
                    reasoning: "Analysis failed".to_string(),
                    analysis: None,
                    signal: None,
                    executed: false,
                    error_reason: Some(e.to_string()),
                };
            }
        };

        self.write_state()
            .last_analysis
            .insert(symbol.to_string(), analysis.clone());

        let signal = evaluate_signal(&analysis, prefs);
        let mut decision = TradingDecision {
            timestamp: now,
            symbol: symbol.to_string(),
            action: signal.action.into(),
            reasoning: signal.reasoning.clone(),
            analysis: Some(analysis),
            signal: None,
            executed: false,
            error_reason: None,
        };

        if signal.is_actionable() {
            match self.execute(&signal).await {
                Ok(position) => {
                    decision.executed = true;
                    info!(
                        "Trade executed for {}: {} {}",
                        symbol, signal.action, position.side
                    );
                }
                Err(e) => {
                    warn!("Trade execution failed for {}: {}", symbol, e);
                    decision.error_reason = Some(e.to_string());
                }
            }
        } else {
            debug!("{}: {}", symbol, signal.reasoning);
        }

        decision.signal = Some(signal);
        decision
    }

    /// Size and open a position for an actionable signal.
    async fn execute(&self, signal: &TradeSignal) -> Result<Position, AutoTraderError> {
        let side = signal.side.ok_or(AutoTraderError::MissingSide)?;
        let amount = self.portfolio.cash().await * signal.position_size;

        self.portfolio
            .can_trade(amount)
            .await
            .map_err(AutoTraderError::RiskCheck)?;

        let position = self
            .portfolio
            .open_position(&signal.symbol, side, amount)
            .await
            .map_err(AutoTraderError::Execution)?;

        self.publish(TradingEvent::TradeOpened {
            symbol: position.symbol.clone(),
            side,
            amount,
            entry_price: position.entry_price,
            stop_loss: position.stop_loss,
            take_profit: position.take_profit,
        });

        Ok(position)
    }

    async fn check_exit_conditions(&self) {
        for trade in self.portfolio.check_stop_loss().await {
            info!(
                "Position closed: {} {} - P&L: ${:.2}",
                trade.symbol, trade.side, trade.pnl
            );

            self.record(TradingDecision {
                timestamp: chrono::Utc::now().timestamp_millis(),
                symbol: trade.symbol.clone(),
                action: DecisionAction::Close,
                reasoning: format!("Exit triggered - P&L: ${:.2}", trade.pnl),
                analysis: None,
                signal: None,
                executed: true,
                error_reason: None,
            });

            self.publish(TradingEvent::TradeClosed {
                trade,
                reason: "Stop-loss triggered".to_string(),
            });
        }
    }

    async fn check_profit_target(&self, prefs: &TradingPreferences) {
        let total_pnl = self.portfolio.total_pnl().await;
        let profit_pct = total_pnl / self.portfolio.initial_budget();

        if profit_pct >= prefs.profit_target {
            info!(
                "Profit target reached: P&L ${:.2} ({:.1}%) >= target {:.1}%",
                total_pnl,
                profit_pct * 100.0,
                prefs.profit_target * 100.0
            );
            self.publish(TradingEvent::ProfitTargetReached {
                current_pnl: total_pnl,
                profit_pct: profit_pct * 100.0,
                target_pct: prefs.profit_target * 100.0,
                current_cash: self.portfolio.cash().await,
            });
        }
    }

    fn record(&self, decision: TradingDecision) {
        self.write_state().decisions.push(decision);
    }

    fn publish(&self, event: TradingEvent) {
        // No subscribers is fine
        let _ = self.event_tx.send(event);
    }

    // =========================================================================
    // Status
    // =========================================================================

    pub async fn status(&self) -> AutoTraderStatus {
        let (running, started_at, interval, loop_count, assets, last_loop_at, analysis, recent) = {
            let state = self.read_state();
            (
                state.running,
                state.started_at,
                state
                    .preferences
                    .as_ref()
                    .map(|p| p.style.interval())
                    .unwrap_or(DEFAULT_INTERVAL),
                state.loop_count,
                state
                    .preferences
                    .as_ref()
                    .map(|p| p.assets.clone())
                    .unwrap_or_default(),
                state.last_loop_at,
                state.last_analysis.clone(),
                state.decisions.recent(RECENT_DECISIONS),
            )
        };

        let message = if running {
            format!(
                "Auto-trading running. Loop #{}, monitoring {} assets.",
                loop_count,
                assets.len()
            )
        } else {
            "Auto-trading is stopped.".to_string()
        };

        AutoTraderStatus {
            running,
            started_at,
            interval_secs: interval.as_secs(),
            loop_count,
            assets_monitored: assets,
            last_loop_at,
            current_analysis: analysis,
            recent_decisions: recent,
            open_positions: self.portfolio.open_position_count().await,
            total_pnl: self.portfolio.total_pnl().await,
            message,
        }
    }

    /// Full decision log, oldest first.
    pub fn decisions(&self) -> Vec<TradingDecision> {
        let state = self.read_state();
        state.decisions.recent(state.decisions.len())
    }
}

/// Clears the loop marker when the loop task ends, including by panic.
struct LoopExit {
    trader: Arc<AutoTrader>,
    run_id: u64,
}

impl Drop for LoopExit {
    fn drop(&mut self) {
        self.trader.loop_exited(self.run_id);
    }
}
