//! Raw pointer, touch and click input

use super::{Navigator, TimerKind};
use crate::intent::find_link;
use crate::DomNode;
use tracing::{debug, trace};

/// Mouse button of a click
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointerButton {
    Primary,
    Auxiliary,
    Secondary,
    Other(u16),
}

impl From<u16> for PointerButton {
    fn from(button: u16) -> Self {
        match button {
            0 => PointerButton::Primary,
            1 => PointerButton::Auxiliary,
            2 => PointerButton::Secondary,
            other => PointerButton::Other(other),
        }
    }
}

/// Modifier keys held during a click
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Modifiers {
    pub meta: bool,
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
}

impl Modifiers {
    /// Whether the click asks for a new tab or window
    pub fn opens_elsewhere(&self) -> bool {
        self.meta || self.ctrl
    }
}

/// Input delivered by the host
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent<N> {
    /// Pointer entered `target`, coming from `related`
    PointerOver { target: N, related: Option<N> },
    /// Pointer left `target`, heading to `related`
    PointerOut { target: N, related: Option<N> },
    /// Touch began on `target`
    TouchStart { target: N },
    /// Touch released
    TouchEnd,
    /// Touch aborted by the platform
    TouchCancel,
    /// Click on `target`
    Click {
        target: N,
        button: PointerButton,
        modifiers: Modifiers,
        default_prevented: bool,
    },
}

/// What the navigator did with an input event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Disposition {
    /// Not relevant to speculative navigation
    Ignored,
    /// Tracked; the host keeps its default behaviour
    Observed,
    /// Taken over; the host must prevent its default navigation
    Handled,
}

impl Navigator {
    /// Translate one host input event into state machine operations
    pub fn handle_input<N: DomNode>(&mut self, event: InputEvent<N>) -> Disposition {
        if !self.config.supported {
            return Disposition::Ignored;
        }

        match event {
            InputEvent::PointerOver { target, related } => self.on_pointer_over(target, related),
            InputEvent::PointerOut { target, related } => self.on_pointer_out(target, related),
            InputEvent::TouchStart { target } => self.on_touch_start(target),
            InputEvent::TouchEnd | InputEvent::TouchCancel => self.on_touch_release(),
            InputEvent::Click {
                target,
                button,
                modifiers,
                default_prevented,
            } => self.on_click(target, button, modifiers, default_prevented),
        }
    }

    fn on_pointer_over<N: DomNode>(&mut self, target: N, related: Option<N>) -> Disposition {
        if self.within_touch_guard() {
            trace!("Pointer-over suppressed after touch");
            return Disposition::Ignored;
        }
        if same_link(&target, related.as_ref()) {
            return Disposition::Ignored;
        }

        let candidate = match self.classifier.classify(&target, &self.location) {
            Ok(candidate) => candidate,
            Err(rejection) => {
                trace!("Hover target rejected: {}", rejection);
                return Disposition::Ignored;
            }
        };

        if self.cache.is_valid(&candidate.key) {
            debug!("{} already cached", candidate.key);
            return Disposition::Observed;
        }
        if self.pending_display {
            return Disposition::Observed;
        }

        let delay = self.config.delay_before_preload;
        self.schedule_intent(candidate.key, delay);
        Disposition::Observed
    }

    fn on_pointer_out<N: DomNode>(&mut self, target: N, related: Option<N>) -> Disposition {
        if same_link(&target, related.as_ref()) {
            return Disposition::Ignored;
        }

        let Ok(candidate) = self.classifier.classify(&target, &self.location) else {
            return Disposition::Ignored;
        };

        let is_intent_target = self
            .scheduled
            .as_ref()
            .map(|s| &s.key)
            .or(self.session.as_ref().map(|s| &s.key))
            .is_some_and(|key| *key == candidate.key);

        if !is_intent_target {
            return Disposition::Ignored;
        }

        self.cancel_intent();
        Disposition::Observed
    }

    fn on_touch_start<N: DomNode>(&mut self, target: N) -> Disposition {
        self.last_touch = Some(self.clock.now());

        let candidate = match self.classifier.classify(&target, &self.location) {
            Ok(candidate) => candidate,
            Err(_) => return Disposition::Ignored,
        };

        if self.cache.is_valid(&candidate.key) {
            return Disposition::Observed;
        }

        self.clear_touch_release();
        self.start_prefetch(candidate.key);
        Disposition::Observed
    }

    fn on_touch_release(&mut self) -> Disposition {
        if self.session.is_none() || self.pending_display {
            return Disposition::Ignored;
        }

        self.clear_touch_release();
        let grace = self.config.touch_release_grace;
        self.touch_release = Some(self.arm_timer(TimerKind::TouchRelease, grace));
        Disposition::Observed
    }

    fn on_click<N: DomNode>(
        &mut self,
        target: N,
        button: PointerButton,
        modifiers: Modifiers,
        default_prevented: bool,
    ) -> Disposition {
        self.clear_touch_release();

        if default_prevented {
            return Disposition::Ignored;
        }

        let candidate = match self.classifier.classify(&target, &self.location) {
            Ok(candidate) => candidate,
            Err(rejection) => {
                trace!("Click target rejected: {}", rejection);
                return Disposition::Ignored;
            }
        };

        if button != PointerButton::Primary || modifiers.opens_elsewhere() {
            return Disposition::Ignored;
        }

        self.commit(candidate.key);
        Disposition::Handled
    }

    fn within_touch_guard(&self) -> bool {
        let guard = self.config.touch_hover_guard;
        self.last_touch
            .is_some_and(|at| self.clock.now().saturating_duration_since(at) < guard)
    }

    fn clear_touch_release(&mut self) {
        if let Some(timer) = self.touch_release.take() {
            timer.clear();
        }
    }
}

/// Whether `target` and `related` resolve to the same link node
fn same_link<N: DomNode>(target: &N, related: Option<&N>) -> bool {
    let Some(related) = related else {
        return false;
    };
    match (find_link(target), find_link(related)) {
        (Some((a, _)), Some((b, _))) => a == b,
        _ => false,
    }
}
