#![warn(missing_docs)]
//! # alfahm-app binary
//!
//! Console entry point for alfahm: a line-command shell over the slot
//! board, capture session, and submission pipeline.

/// CLI entry point.
fn main() {
    if let Err(error) = shell::run() {
        eprintln!("failed to run alfahm shell: {error}");
        std::process::exit(1);
    }
}

mod shell {
    //! Interactive shell with mode selection, pickers, camera controls,
    //! submission, and per-run file logging.

    use std::io::{BufRead, Write};
    use std::path::Path;
    use std::sync::Arc;
    use std::time::{SystemTime, UNIX_EPOCH};

    use alfahm_app::{
        RunLogger, SubmissionMachine, app_version, bulk_fill_from_picker,
        camera_enabled_from_env, capture_into_slot, http_timeout_from_env,
        predict_endpoint_from_env, project_runtime_status, replace_slot_from_picker,
        submit_active_slots, user_message_for,
    };
    use alfahm_capture::{CameraBackend, CaptureSession, CaptureState, Facing};
    use alfahm_core::PhotoMode;
    use alfahm_slots::{InMemoryPreviewRegistry, SlotBoard};
    use alfahm_ui::{SessionResultStore, StageStatus, UiState, take_result};
    use alfahm_upload::{PredictClient, StubPredictor, UreqPredictTransport};

    struct AppController {
        board: SlotBoard<InMemoryPreviewRegistry>,
        ui: UiState,
        machine: SubmissionMachine,
        store: SessionResultStore,
        client: PredictClient,
        stub: StubPredictor,
        camera_backend: Arc<dyn CameraBackend>,
        session: Option<CaptureSession>,
        logger: RunLogger,
    }

    impl AppController {
        fn new(logger: RunLogger) -> Result<Self, String> {
            let endpoint = predict_endpoint_from_env();
            let transport = Arc::new(UreqPredictTransport::new(http_timeout_from_env()));
            let client = PredictClient::new(&endpoint, transport)
                .map_err(|error| format!("predict client init failed: {error}"))?;

            Ok(Self {
                board: SlotBoard::new(InMemoryPreviewRegistry::new()),
                ui: UiState::new(app_version()),
                machine: SubmissionMachine::new(),
                store: SessionResultStore::new(),
                client,
                stub: StubPredictor::new(),
                camera_backend: default_camera_backend(),
                session: None,
                logger,
            })
        }
    }

    #[cfg(feature = "real-camera")]
    fn default_camera_backend() -> Arc<dyn CameraBackend> {
        Arc::new(alfahm_capture::real::NokhwaCameraBackend::new())
    }

    #[cfg(not(feature = "real-camera"))]
    fn default_camera_backend() -> Arc<dyn CameraBackend> {
        Arc::new(alfahm_capture::SyntheticCameraBackend::new(1280, 720))
    }

    /// Starts the shell loop and blocks until the user quits.
    pub fn run() -> Result<(), String> {
        let log_dir = run_log_dir();
        let logger = RunLogger::create_in(&log_dir)?;
        logger.info(
            "bootstrap",
            "startup",
            &format!(
                "version={} endpoint={} camera_enabled={}",
                app_version(),
                predict_endpoint_from_env(),
                camera_enabled_from_env()
            ),
        );

        let mut controller = AppController::new(logger)?;
        println!("alfahm {}", app_version());
        println!("type 'help' for commands");

        let stdin = std::io::stdin();
        loop {
            print!("> ");
            let _ = std::io::stdout().flush();

            let mut line = String::new();
            if stdin.lock().read_line(&mut line).map_err(|error| error.to_string())? == 0 {
                break;
            }

            let tokens: Vec<&str> = line.split_whitespace().collect();
            let Some((&command, args)) = tokens.split_first() else {
                continue;
            };
            if command == "quit" || command == "exit" {
                break;
            }

            match dispatch(&mut controller, command, args) {
                Ok(message) => {
                    if !message.is_empty() {
                        println!("{message}");
                    }
                }
                Err(error) => {
                    controller.logger.error("shell", command, &error);
                    controller.ui.status_line = error.clone();
                    println!("error: {error}");
                }
            }
        }

        if let Some(session) = controller.session.as_mut() {
            session.close();
        }
        controller.logger.info("shell", "shutdown", "session ended");
        Ok(())
    }

    fn dispatch(
        controller: &mut AppController,
        command: &str,
        args: &[&str],
    ) -> Result<String, String> {
        if !controller.ui.can_interact() && command != "status" {
            return Err("a submission is in flight; please wait".to_string());
        }

        match command {
            "help" => Ok(help_text()),
            "mode" => handle_mode(controller, args),
            "pick" => handle_pick(controller, args),
            "replace" => handle_replace(controller, args),
            "camera" => handle_camera_open(controller, args),
            "facing" => handle_facing(controller),
            "retry" => handle_retry(controller),
            "capture" => handle_capture(controller),
            "cancel" => handle_camera_cancel(controller),
            "reset" => handle_reset(controller),
            "submit" => handle_submit(controller),
            "status" => Ok(render_status(controller)),
            "results" => handle_results(controller),
            other => Err(format!("unknown command '{other}'; type 'help'")),
        }
    }

    fn handle_mode(controller: &mut AppController, args: &[&str]) -> Result<String, String> {
        let count = args
            .first()
            .and_then(|value| value.parse::<usize>().ok())
            .ok_or_else(|| "usage: mode <2|4>".to_string())?;
        let mode = PhotoMode::from_count(count).map_err(|error| error.to_string())?;

        controller.board.set_mode(mode);
        controller.ui.set_mode(mode);
        controller
            .logger
            .info("slots", "mode", &format!("required_count={count}"));
        Ok(format!("{count}-photo mode"))
    }

    fn handle_pick(controller: &mut AppController, args: &[&str]) -> Result<String, String> {
        if args.is_empty() {
            return Err("usage: pick <path> [path ...]".to_string());
        }

        let mut picked = Vec::with_capacity(args.len());
        for path in args {
            picked.push((file_name_of(path), read_file(path)?));
        }

        bulk_fill_from_picker(&mut controller.board, picked)
            .map_err(|error| user_message_for(&error))?;
        controller.logger.info(
            "slots",
            "bulk_fill",
            &format!("selected={}", controller.board.selected_count()),
        );
        Ok(format!("{} photos selected", controller.board.selected_count()))
    }

    fn handle_replace(controller: &mut AppController, args: &[&str]) -> Result<String, String> {
        let (index, path) = match args {
            [index, path] => (
                index
                    .parse::<usize>()
                    .map_err(|_| "usage: replace <slot> <path>".to_string())?,
                path,
            ),
            _ => return Err("usage: replace <slot> <path>".to_string()),
        };

        let bytes = read_file(path)?;
        replace_slot_from_picker(&mut controller.board, index, file_name_of(path), bytes)
            .map_err(|error| user_message_for(&error))?;
        controller
            .logger
            .info("slots", "replace", &format!("slot={index}"));
        Ok(format!("slot {index} replaced"))
    }

    fn handle_camera_open(controller: &mut AppController, args: &[&str]) -> Result<String, String> {
        if !camera_enabled_from_env() {
            controller.ui.camera = StageStatus::Degraded;
            return Err("camera blocked by ALFAHM_CAMERA_ENABLED kill-switch".to_string());
        }

        let target = match args.first() {
            Some(value) => Some(
                value
                    .parse::<usize>()
                    .map_err(|_| "usage: camera [slot]".to_string())?,
            ),
            None => None,
        };

        // Only one capture session at a time; close the previous stream
        // before requesting the next.
        if let Some(session) = controller.session.as_mut() {
            session.close();
        }

        let session = CaptureSession::open(
            Arc::clone(&controller.camera_backend),
            Facing::Environment,
            target,
        );
        let message = describe_capture_state(session.state());
        controller.ui.camera = match session.state() {
            CaptureState::Streaming => StageStatus::Running,
            _ => StageStatus::Degraded,
        };
        controller
            .logger
            .info("camera", "open", &format!("target={target:?} state={message}"));
        controller.session = Some(session);
        Ok(message)
    }

    fn handle_facing(controller: &mut AppController) -> Result<String, String> {
        let session = controller
            .session
            .as_mut()
            .ok_or_else(|| "no capture session open; use 'camera' first".to_string())?;
        session.switch_facing();
        controller
            .logger
            .info("camera", "facing", &format!("facing={:?}", session.facing()));
        Ok(format!(
            "facing {:?}: {}",
            session.facing(),
            describe_capture_state(session.state())
        ))
    }

    fn handle_retry(controller: &mut AppController) -> Result<String, String> {
        let session = controller
            .session
            .as_mut()
            .ok_or_else(|| "no capture session open; use 'camera' first".to_string())?;
        session.retry();
        let message = describe_capture_state(session.state());
        controller.ui.camera = match session.state() {
            CaptureState::Streaming => StageStatus::Running,
            _ => StageStatus::Degraded,
        };
        controller.logger.info("camera", "retry", &message);
        Ok(message)
    }

    fn handle_capture(controller: &mut AppController) -> Result<String, String> {
        let session = controller
            .session
            .as_mut()
            .ok_or_else(|| "no capture session open; use 'camera' first".to_string())?;

        let inserted = capture_into_slot(&mut controller.board, session, unix_timestamp_millis())
            .map_err(|error| user_message_for(&error))?;

        match inserted {
            Some(index) => {
                // Capture success closes the session as a side effect.
                controller.session = None;
                controller.ui.camera = StageStatus::Healthy;
                controller
                    .logger
                    .info("camera", "capture", &format!("slot={index}"));
                Ok(format!(
                    "captured into slot {index} ({} selected)",
                    controller.board.selected_count()
                ))
            }
            None => Ok("no frame available yet; try again".to_string()),
        }
    }

    fn handle_camera_cancel(controller: &mut AppController) -> Result<String, String> {
        match controller.session.as_mut() {
            Some(session) => {
                session.close();
                controller.session = None;
                controller.ui.camera = StageStatus::Idle;
                controller.logger.info("camera", "cancel", "session closed");
                Ok("camera closed".to_string())
            }
            None => Ok("no capture session open".to_string()),
        }
    }

    fn handle_reset(controller: &mut AppController) -> Result<String, String> {
        controller.board.reset();
        controller.logger.info("slots", "reset", "all slots cleared");
        Ok("all slots cleared".to_string())
    }

    fn handle_submit(controller: &mut AppController) -> Result<String, String> {
        controller.ui.begin_submission();
        let outcome = submit_active_slots(
            &controller.board,
            &mut controller.machine,
            &controller.client,
            &controller.stub,
            &mut controller.store,
        );

        match outcome {
            Ok(stored) => {
                controller.ui.submission_succeeded();
                controller.machine = SubmissionMachine::new();
                controller.logger.info(
                    "submission",
                    "success",
                    &format!("count={}", stored.count),
                );
                Ok("prediction stored; run 'results' to reveal the winners".to_string())
            }
            Err(error) => {
                let message = user_message_for(&error);
                controller.ui.submission_failed(&message);
                Err(message)
            }
        }
    }

    fn handle_results(controller: &mut AppController) -> Result<String, String> {
        match take_result(&mut controller.store) {
            Some(result) => {
                let mut lines = vec![format!(
                    "winner 1: {}",
                    result.winner1_card_url.as_deref().unwrap_or("(no card)")
                )];
                if result.count == 4 {
                    lines.push(format!(
                        "winner 2: {}",
                        result.winner2_card_url.as_deref().unwrap_or("(no card)")
                    ));
                }
                Ok(lines.join("\n"))
            }
            None => Ok("no results found; run a prediction first".to_string()),
        }
    }

    fn render_status(controller: &AppController) -> String {
        let runtime = project_runtime_status(&controller.ui);
        let capture_state = controller
            .session
            .as_ref()
            .map(|session| describe_capture_state(session.state()))
            .unwrap_or_else(|| "closed".to_string());

        format!(
            "version={} | mode={} | selected={}/{} | camera={} ({}) | submission={} | {}",
            controller.ui.version,
            runtime.required_count,
            controller.board.selected_count(),
            runtime.required_count,
            runtime.camera,
            capture_state,
            runtime.submission,
            runtime.status
        )
    }

    fn describe_capture_state(state: &CaptureState) -> String {
        match state {
            CaptureState::Idle => "camera idle".to_string(),
            CaptureState::Requesting => "requesting camera...".to_string(),
            CaptureState::Streaming => "camera streaming".to_string(),
            CaptureState::Error(message) => format!("camera error: {message} (use 'retry')"),
        }
    }

    fn help_text() -> String {
        [
            "mode <2|4>            choose how many photos to submit",
            "pick <path> ...       select exactly mode-many image files",
            "replace <slot> <path> replace one slot (0-3) from a file",
            "camera [slot]         open the capture session",
            "facing                switch between outward and selfie camera",
            "retry                 retry a denied camera request",
            "capture               take the photo and close the camera",
            "cancel                close the camera without capturing",
            "reset                 clear all slots",
            "submit                predict the winners",
            "results               reveal the stored winners (reads once)",
            "status                show runtime status",
            "quit                  exit",
        ]
        .join("\n")
    }

    fn read_file(path: &str) -> Result<Vec<u8>, String> {
        std::fs::read(path).map_err(|error| format!("cannot read '{path}': {error}"))
    }

    fn file_name_of(path: &str) -> String {
        Path::new(path)
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string())
    }

    fn run_log_dir() -> std::path::PathBuf {
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| std::path::PathBuf::from("."))
    }

    fn unix_timestamp_millis() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |duration| duration.as_millis() as u64)
    }
}
