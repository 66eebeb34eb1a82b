use crate::config::{OverlayMode, OverlaySettings};
use chrono::{DateTime, Local};
use tracing::debug;

/// Transient UI states that force the overlay visible regardless of the
/// foreground window (color picker open, overlay being dragged).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OverlayOverrides {
    pub selecting_color: bool,
    pub dragging: bool,
}

/// The display surface behind the on-screen clock. The real implementation
/// lives in the presentation layer; the engine only drives this seam.
pub trait OverlaySurface: Send {
    fn set_time(&mut self, text: &str);
    fn show(&mut self);
    fn hide(&mut self);
    fn is_visible(&self) -> bool;
}

/// OS-specific foreground window title query, isolated behind a trait so the
/// policy never depends on the concrete mechanism.
pub trait ForegroundWindow: Send {
    fn title(&self) -> String;
}

/// Stand-in for headless runs: no foreground window, empty title.
pub struct NullForegroundWindow;

impl ForegroundWindow for NullForegroundWindow {
    fn title(&self) -> String {
        String::new()
    }
}

/// Overlay surface that traces its calls instead of drawing.
#[derive(Default)]
pub struct TracingOverlaySurface {
    visible: bool,
}

impl OverlaySurface for TracingOverlaySurface {
    fn set_time(&mut self, _text: &str) {}

    fn show(&mut self) {
        self.visible = true;
        debug!("overlay shown");
    }

    fn hide(&mut self) {
        self.visible = false;
        debug!("overlay hidden");
    }

    fn is_visible(&self) -> bool {
        self.visible
    }
}

/// Pure visibility decision: enabled AND (always-mode OR foreground title
/// matches a configured substring, case-insensitively), with the override
/// flags OR'd on top.
pub fn overlay_should_show(
    settings: &OverlaySettings,
    foreground_title: &str,
    overrides: OverlayOverrides,
) -> bool {
    if !settings.enabled {
        return false;
    }
    let context_visible = match settings.mode {
        OverlayMode::Always => true,
        OverlayMode::Custom => {
            let title = foreground_title.to_lowercase();
            settings
                .windows
                .iter()
                .any(|window| !window.is_empty() && title.contains(&window.to_lowercase()))
        }
    };
    context_visible || overrides.selecting_color || overrides.dragging
}

/// Applies visibility decisions idempotently and pushes local-time text to
/// the surface.
pub struct OverlayController<S: OverlaySurface> {
    surface: S,
}

impl<S: OverlaySurface> OverlayController<S> {
    pub fn new(surface: S) -> Self {
        Self { surface }
    }

    pub fn set_time(&mut self, now_local: DateTime<Local>) {
        self.surface
            .set_time(&now_local.format("%H:%M:%S").to_string());
    }

    pub fn refresh(
        &mut self,
        settings: &OverlaySettings,
        foreground: &dyn ForegroundWindow,
        overrides: OverlayOverrides,
    ) {
        let desired = overlay_should_show(settings, &foreground.title(), overrides);
        self.apply(desired);
    }

    // No-op when already in the desired state.
    fn apply(&mut self, desired: bool) {
        if desired && !self.surface.is_visible() {
            self.surface.show();
        } else if !desired && self.surface.is_visible() {
            self.surface.hide();
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }
}
