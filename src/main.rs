#![cfg_attr(all(windows, not(debug_assertions)), windows_subsystem = "windows")]

#[cfg(windows)]
fn main() -> anyhow::Result<()> {
    shell::run()
}

#[cfg(not(windows))]
fn main() {
    eprintln!("display-refresh-rate only runs on Windows");
    std::process::exit(1);
}

#[cfg(windows)]
mod shell {
    use anyhow::{Context, Result};
    use display_refresh_rate::app::{AppEvent, AppState};
    use display_refresh_rate::audio::{
        spawn_listener, AudioEndpointRouter, MmDeviceEndpoints, NotificationRegistration,
        PolicyConfig, RouterTimings,
    };
    use display_refresh_rate::config::{IniProfile, SharedSettings};
    use display_refresh_rate::coordinator::{
        ModeTransitionCoordinator, TransitionTimings, UiDispatch, UiUpdate,
    };
    use display_refresh_rate::display::{DisplaySwitcher, ModeEnumerator};
    use display_refresh_rate::hotkey::HotkeyId;
    use display_refresh_rate::logging;
    use display_refresh_rate::platform::{
        register_hotkeys, unregister_hotkeys, DisplaySwitchExe, RunKeyEntry, Win32DisplayModes,
        WindowDispatcher, WM_APP_UPDATE,
    };
    use display_refresh_rate::ui::TrayManager;
    use std::cell::RefCell;
    use std::sync::mpsc::{channel, Receiver};
    use std::sync::Arc;
    use tracing::{debug, error, info, warn};
    use windows::core::*;
    use windows::Win32::Foundation::*;
    use windows::Win32::System::Com::*;
    use windows::Win32::UI::WindowsAndMessaging::*;

    type Coordinator =
        ModeTransitionCoordinator<Win32DisplayModes, DisplaySwitchExe, MmDeviceEndpoints, PolicyConfig>;

    fn show_error(msg: &str) {
        unsafe {
            let msg_wide: Vec<u16> = msg.encode_utf16().chain(std::iter::once(0)).collect();
            let title_wide: Vec<u16> = "DisplayRefreshRate Error"
                .encode_utf16()
                .chain(std::iter::once(0))
                .collect();
            MessageBoxW(
                None,
                PCWSTR(msg_wide.as_ptr()),
                PCWSTR(title_wide.as_ptr()),
                MB_OK | MB_ICONERROR,
            );
        }
    }

    pub fn run() -> Result<()> {
        match logging::default_log_path().and_then(|path| logging::init(&path)) {
            Ok(()) => info!("DisplayRefreshRate starting"),
            Err(e) => eprintln!("Logging disabled: {e}"),
        }

        unsafe {
            // Initialize COM
            if let Err(e) = CoInitializeEx(None, COINIT_APARTMENTTHREADED).ok() {
                show_error(&format!("COM init failed: {:?}", e));
                return Err(e).context("COM initialization failed");
            }
        }

        let result = run_message_loop();
        if let Err(e) = &result {
            error!(error = ?e, "Fatal error");
            show_error(&format!("{e:#}"));
        }

        unsafe {
            CoUninitialize();
        }
        result
    }

    fn create_window() -> Result<HWND> {
        unsafe {
            // Create hidden top-level window; message-only windows miss WM_DISPLAYCHANGE
            let instance = windows::Win32::System::LibraryLoader::GetModuleHandleW(None)?;

            let window_class = w!("DisplayRefreshRateWindow");
            let wc = WNDCLASSEXW {
                cbSize: std::mem::size_of::<WNDCLASSEXW>() as u32,
                style: CS_HREDRAW | CS_VREDRAW,
                lpfnWndProc: Some(window_proc),
                hInstance: instance.into(),
                lpszClassName: window_class,
                ..Default::default()
            };

            RegisterClassExW(&wc);

            let hwnd = CreateWindowExW(
                WINDOW_EX_STYLE::default(),
                window_class,
                w!("DisplayRefreshRate"),
                WS_OVERLAPPEDWINDOW,
                CW_USEDEFAULT,
                CW_USEDEFAULT,
                CW_USEDEFAULT,
                CW_USEDEFAULT,
                None,
                None,
                instance,
                None,
            )?;
            Ok(hwnd)
        }
    }

    fn run_message_loop() -> Result<()> {
        let hwnd = create_window().context("Failed to create message window")?;
        let shell = Shell::new(hwnd)?;
        SHELL.with(|state| *state.borrow_mut() = Some(shell));

        unsafe {
            // Message loop
            let mut msg = MSG::default();
            while GetMessageW(&mut msg, None, 0, 0).into() {
                let _ = TranslateMessage(&msg);
                DispatchMessageW(&msg);
                with_shell(|shell| shell.process_tray());
            }
        }

        // Dropping the shell unregisters hotkeys and notifications
        SHELL.with(|state| state.borrow_mut().take());
        info!("DisplayRefreshRate stopped");
        Ok(())
    }

    struct Shell {
        hwnd: HWND,
        app: AppState,
        coordinator: Coordinator,
        tray: TrayManager,
        startup: RunKeyEntry,
        updates: Receiver<UiUpdate>,
        _notifications: Option<NotificationRegistration>,
    }

    impl Shell {
        fn new(hwnd: HWND) -> Result<Self> {
            let profile = IniProfile::beside_executable().context("Failed to locate settings file")?;
            info!(path = %profile.path().display(), "Loading settings");
            let settings = SharedSettings::load(Box::new(profile));
            let hotkeys = settings.snapshot().hotkeys;

            let (dispatcher, updates) = WindowDispatcher::new(hwnd);
            let dispatcher = Arc::new(dispatcher);

            let switcher = DisplaySwitcher::new(DisplaySwitchExe);
            let router = Arc::new(AudioEndpointRouter::new(
                MmDeviceEndpoints::new(),
                PolicyConfig::new(),
                settings.clone(),
                RouterTimings::default(),
                switcher.current_mode(),
            ));

            let (event_tx, event_rx) = channel();
            let notifications = match NotificationRegistration::register(event_tx) {
                Ok(registration) => Some(registration),
                Err(e) => {
                    warn!(error = %e, "Audio device notifications unavailable");
                    None
                }
            };
            let listener_dispatch = Arc::clone(&dispatcher);
            spawn_listener(Arc::clone(&router), event_rx, move || {
                listener_dispatch.dispatch(UiUpdate::DevicesChanged)
            })
            .context("Failed to start audio listener")?;

            let coordinator = ModeTransitionCoordinator::new(
                switcher,
                Arc::new(ModeEnumerator::new(Win32DisplayModes)),
                router,
                settings,
                dispatcher,
                TransitionTimings::default(),
            );

            let registered = register_hotkeys(hwnd, &hotkeys);
            debug!(registered, "Hotkeys ready");

            let mut tray = TrayManager::create(&hotkeys).context("Failed to create tray icon")?;
            let startup = RunKeyEntry::new();
            let mut app = AppState::new();
            app.initialize(&coordinator, &startup, &mut tray);

            Ok(Self {
                hwnd,
                app,
                coordinator,
                tray,
                startup,
                updates,
                _notifications: notifications,
            })
        }

        fn handle(&mut self, event: AppEvent) {
            self.app
                .handle_event(event, &mut self.coordinator, &self.startup, &mut self.tray);
            if self.app.should_exit {
                unsafe {
                    let _ = DestroyWindow(self.hwnd);
                }
            }
        }

        fn drain_updates(&mut self) {
            while let Ok(update) = self.updates.try_recv() {
                self.handle(AppEvent::Update(update));
            }
        }

        fn process_tray(&mut self) {
            for action in self.tray.process_events() {
                self.handle(AppEvent::Action(action));
            }
        }
    }

    impl Drop for Shell {
        fn drop(&mut self) {
            unregister_hotkeys(self.hwnd);
            self.tray.destroy();
        }
    }

    thread_local! {
        static SHELL: RefCell<Option<Shell>> = const { RefCell::new(None) };
    }

    /// Run `f` against the shell unless it is already borrowed further up
    /// the stack (a modal message box pumps messages re-entrantly).
    fn with_shell<F>(f: F)
    where
        F: FnOnce(&mut Shell),
    {
        SHELL.with(|state| match state.try_borrow_mut() {
            Ok(mut shell) => {
                if let Some(shell) = shell.as_mut() {
                    f(shell);
                }
            }
            Err(_) => debug!("Shell busy; deferring message"),
        });
    }

    unsafe extern "system" fn window_proc(
        hwnd: HWND,
        msg: u32,
        wparam: WPARAM,
        lparam: LPARAM,
    ) -> LRESULT {
        match msg {
            WM_APP_UPDATE => {
                with_shell(|shell| shell.drain_updates());
                LRESULT(0)
            }
            WM_HOTKEY => {
                if let Some(id) = HotkeyId::from_raw(wparam.0 as i32) {
                    debug!(?id, "Hotkey pressed");
                    with_shell(|shell| shell.handle(AppEvent::Action(id.into())));
                }
                LRESULT(0)
            }
            WM_DISPLAYCHANGE => {
                with_shell(|shell| shell.handle(AppEvent::DisplayChanged));
                DefWindowProcW(hwnd, msg, wparam, lparam)
            }
            WM_DESTROY => {
                PostQuitMessage(0);
                LRESULT(0)
            }
            _ => DefWindowProcW(hwnd, msg, wparam, lparam),
        }
    }
}
