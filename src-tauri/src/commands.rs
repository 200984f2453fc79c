use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tauri::{AppHandle, Emitter, Manager, State};
use tokio::sync::{oneshot, Mutex};

use crate::animation::IntervalTicker;
use crate::draw::{Lottery, Snapshot, SpinPlan};
use crate::export;
use crate::import::{entries_from_rows, ImportRow};
use crate::models::Place;
use crate::round::Podium;
use crate::settings::SpinSettings;
use crate::store::{AuditLogItem, SqliteStore};

/* ------------------- STATE ------------------- */
#[derive(Clone)]
struct AppLottery(Arc<Mutex<Lottery>>);

#[derive(Default)]
struct SpinSlot {
    tx: Option<oneshot::Sender<()>>,
    closed: bool,
}

/// Cancel handle of the spin currently animating, if any. Once the window
/// is gone no further spin can be armed.
#[derive(Default)]
struct SpinControl(std::sync::Mutex<SpinSlot>);

impl SpinControl {
    fn arm(&self, tx: oneshot::Sender<()>) -> bool {
        match self.0.lock() {
            Ok(mut slot) if !slot.closed => {
                slot.tx = Some(tx);
                true
            }
            _ => false,
        }
    }

    fn disarm(&self) {
        if let Ok(mut slot) = self.0.lock() {
            slot.tx = None;
        }
    }

    fn cancel(&self) -> bool {
        let tx = self.0.lock().ok().and_then(|mut slot| slot.tx.take());
        tx.map(|tx| tx.send(()).is_ok()).unwrap_or(false)
    }

    fn close(&self) -> bool {
        if let Ok(mut slot) = self.0.lock() {
            slot.closed = true;
        }
        self.cancel()
    }
}

/* ------------------- HELPERS ------------------- */
fn ensure_not_spinning(lottery: &Lottery) -> Result<(), String> {
    if lottery.session().is_spinning() {
        return Err("A spin is in progress; wait for the wheel to stop.".into());
    }
    Ok(())
}

/* ------------------- HEALTH ------------------- */
#[tauri::command]
async fn health_check(lottery: State<'_, AppLottery>) -> Result<String, String> {
    let guard = lottery.0.lock().await;
    guard
        .store()
        .health_check()
        .await
        .map(|_| "ok".to_string())
        .map_err(|e| e.to_string())
}

/* ------------------- LOTTERY ------------------- */
#[tauri::command]
async fn get_snapshot(lottery: State<'_, AppLottery>) -> Result<Snapshot, String> {
    Ok(lottery.0.lock().await.snapshot())
}

#[tauri::command]
async fn import_entries(lottery: State<'_, AppLottery>, rows: Vec<ImportRow>) -> Result<Snapshot, String> {
    let mut guard = lottery.0.lock().await;
    ensure_not_spinning(&guard)?;
    let now = chrono::Utc::now().timestamp_millis();
    let entries = entries_from_rows(rows, now).map_err(|e| e.to_string())?;
    guard.replace_entries(entries).await.map_err(|e| e.to_string())?;
    Ok(guard.snapshot())
}

#[tauri::command]
async fn clear_all(lottery: State<'_, AppLottery>) -> Result<Snapshot, String> {
    let mut guard = lottery.0.lock().await;
    ensure_not_spinning(&guard)?;
    guard.clear_all().await.map_err(|e| e.to_string())?;
    Ok(guard.snapshot())
}

#[tauri::command]
async fn restart_lottery(lottery: State<'_, AppLottery>) -> Result<Snapshot, String> {
    let mut guard = lottery.0.lock().await;
    ensure_not_spinning(&guard)?;
    guard.restart().await.map_err(|e| e.to_string())?;
    Ok(guard.snapshot())
}

#[tauri::command]
async fn get_podium(lottery: State<'_, AppLottery>) -> Result<Podium, String> {
    Ok(lottery.0.lock().await.session().podium())
}

/* ------------------- SPIN ------------------- */
/// Starts a round. Returns `None` when the round is not drawable right now.
/// Progress is streamed as `spin-progress` events and the landed winner as
/// `round-complete`; the session is not locked while the wheel turns.
#[tauri::command]
async fn spin(
    app: AppHandle,
    lottery: State<'_, AppLottery>,
    control: State<'_, SpinControl>,
    place: Place,
) -> Result<Option<SpinPlan>, String> {
    let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
    let plan = {
        let mut guard = lottery.0.lock().await;
        // armed before the round exists so a window close always reaches it
        if guard.session().is_spinning() || !control.arm(cancel_tx) {
            return Ok(None);
        }
        match guard.begin_round(place) {
            Ok(plan) => plan,
            Err(_) => {
                control.disarm();
                return Ok(None);
            }
        }
    };

    let shared = lottery.0.clone();
    let task_plan = plan.clone();
    tauri::async_runtime::spawn(async move {
        let animation = task_plan.animation();
        let mut ticker = IntervalTicker::new();
        let landed = tokio::select! {
            _ = animation.play(&mut ticker, |frame| {
                let _ = app.emit("spin-progress", frame);
            }) => true,
            _ = cancel_rx => false,
        };

        let mut guard = shared.lock().await;
        if !landed {
            guard.cancel_round();
            let _ = app.emit("lottery-updated", guard.snapshot());
            return;
        }
        match guard.finish_round(&task_plan).await {
            Ok(winner) => {
                if let Err(e) = app.emit("round-complete", winner) {
                    tracing::error!("Failed to emit round-complete: {}", e);
                }
                let _ = app.emit("lottery-updated", guard.snapshot());
            }
            Err(e) => tracing::warn!(place = ?task_plan.place, "spin finished without a winner: {}", e),
        }
    });

    Ok(Some(plan))
}

#[tauri::command]
fn cancel_spin(control: State<'_, SpinControl>) -> bool {
    control.cancel()
}

/* ------------------- SETTINGS ------------------- */
#[tauri::command]
async fn get_settings(lottery: State<'_, AppLottery>) -> Result<SpinSettings, String> {
    Ok(lottery.0.lock().await.session().settings().clone())
}

#[tauri::command]
async fn update_settings(lottery: State<'_, AppLottery>, settings: SpinSettings) -> Result<SpinSettings, String> {
    let mut guard = lottery.0.lock().await;
    guard.update_settings(settings).await.map_err(|e| e.to_string())
}

/* ------------------- EXPORT / ACTIVITY ------------------- */
#[tauri::command]
async fn export_results(lottery: State<'_, AppLottery>, file_path: String) -> Result<(), String> {
    let guard = lottery.0.lock().await;
    let session = guard.session();
    export::write_results(PathBuf::from(&file_path).as_path(), session.state(), session.entries())
        .map_err(|e| e.to_string())?;
    guard.store().log_audit("export_results", Some(file_path)).await;
    Ok(())
}

#[tauri::command]
async fn get_recent_activity(lottery: State<'_, AppLottery>, limit: i64) -> Result<Vec<AuditLogItem>, String> {
    let guard = lottery.0.lock().await;
    guard.store().recent_activity(limit).await.map_err(|e| e.to_string())
}

/* ------------------- BOOTSTRAP ------------------- */
fn resolve_db_path(app: &AppHandle) -> Result<PathBuf> {
    let dir = app
        .path()
        .app_local_data_dir()
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    std::fs::create_dir_all(&dir)?;
    Ok(dir.join("lottery.db"))
}

pub fn run() {
    crate::init_tracing();

    tauri::Builder::default()
        .plugin(tauri_plugin_dialog::init())
        .setup(|app| {
            let db_path = resolve_db_path(app.handle())?;
            tracing::info!(path = %db_path.display(), "opening lottery database");

            tauri::async_runtime::block_on(async {
                let store = SqliteStore::open(&db_path).await?;
                let lottery = Lottery::open(store).await?;
                app.manage(AppLottery(Arc::new(Mutex::new(lottery))));
                Ok::<(), anyhow::Error>(())
            })?;
            app.manage(SpinControl::default());
            Ok(())
        })
        .on_window_event(|window, event| {
            if let tauri::WindowEvent::Destroyed = event {
                if window.state::<SpinControl>().close() {
                    tracing::info!("window closed mid-spin, round cancelled");
                }
            }
        })
        .invoke_handler(tauri::generate_handler![
            health_check,
            get_snapshot,
            import_entries,
            clear_all,
            restart_lottery,
            get_podium,
            spin,
            cancel_spin,
            get_settings,
            update_settings,
            export_results,
            get_recent_activity
        ])
        .run(tauri::generate_context!())
        .expect("failed to run tauri");
}
