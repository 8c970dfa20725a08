use serde::Serialize;

use crate::pipeline::{InputError, check_dish};
use crate::translator::TranslatedMenu;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("cannot {action} while the session is {state}")]
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },
    #[error("menu line {index} does not exist ({count} line(s) scanned)")]
    IndexOutOfRange { index: usize, count: usize },
    #[error("no menu items selected")]
    NothingSelected,
    #[error(transparent)]
    Input(#[from] InputError),
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    Empty,
    Scanned {
        lines: Vec<String>,
    },
    Translated {
        lines: Vec<String>,
        translation: TranslatedMenu,
    },
    Selected {
        lines: Vec<String>,
        translation: TranslatedMenu,
        items: Vec<String>,
    },
    Logged {
        items: Vec<String>,
    },
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Empty => "empty",
            SessionState::Scanned { .. } => "scanned",
            SessionState::Translated { .. } => "translated",
            SessionState::Selected { .. } => "selected",
            SessionState::Logged { .. } => "logged",
        }
    }
}

/// One pass through upload, translate, select and log. Each step only
/// accepts the state the previous step leaves behind.
#[derive(Debug, Clone)]
pub struct MenuSession {
    state: SessionState,
}

impl Default for MenuSession {
    fn default() -> Self {
        Self::new()
    }
}

impl MenuSession {
    pub fn new() -> Self {
        Self {
            state: SessionState::Empty,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Starts over with freshly scanned lines. Allowed from any state so a
    /// new photo replaces whatever was in progress.
    pub fn scan(&mut self, lines: Vec<String>) {
        self.state = SessionState::Scanned { lines };
    }

    pub fn translate(&mut self, translation: TranslatedMenu) -> Result<(), SessionError> {
        let lines = match std::mem::replace(&mut self.state, SessionState::Empty) {
            SessionState::Scanned { lines } => lines,
            other => return Err(self.reject("translate", other)),
        };
        self.state = SessionState::Translated { lines, translation };
        Ok(())
    }

    /// Picks menu lines by index. Re-selecting replaces the earlier choice.
    pub fn select(&mut self, indices: &[usize]) -> Result<&[String], SessionError> {
        let (lines, translation) = match &self.state {
            SessionState::Translated { lines, translation }
            | SessionState::Selected {
                lines, translation, ..
            } => (lines, translation),
            other => {
                return Err(SessionError::InvalidTransition {
                    action: "select",
                    state: other.name(),
                });
            }
        };
        if indices.is_empty() {
            return Err(SessionError::NothingSelected);
        }
        let mut items = Vec::with_capacity(indices.len());
        for &index in indices {
            let line = lines.get(index).ok_or(SessionError::IndexOutOfRange {
                index,
                count: lines.len(),
            })?;
            items.push(check_dish(line)?.to_string());
        }
        self.state = SessionState::Selected {
            lines: lines.clone(),
            translation: translation.clone(),
            items,
        };
        Ok(self.selected().unwrap_or_default())
    }

    pub fn selected(&self) -> Option<&[String]> {
        match &self.state {
            SessionState::Selected { items, .. } | SessionState::Logged { items } => Some(items),
            _ => None,
        }
    }

    /// The current selection, only while it is waiting to be logged.
    pub fn items_to_log(&self) -> Result<&[String], SessionError> {
        match &self.state {
            SessionState::Selected { items, .. } => Ok(items),
            other => Err(SessionError::InvalidTransition {
                action: "log",
                state: other.name(),
            }),
        }
    }

    pub fn mark_logged(&mut self) -> Result<(), SessionError> {
        let items = match std::mem::replace(&mut self.state, SessionState::Empty) {
            SessionState::Selected { items, .. } => items,
            other => return Err(self.reject("log", other)),
        };
        self.state = SessionState::Logged { items };
        Ok(())
    }

    pub fn reset(&mut self) {
        self.state = SessionState::Empty;
    }

    fn reject(&mut self, action: &'static str, previous: SessionState) -> SessionError {
        let state = previous.name();
        self.state = previous;
        SessionError::InvalidTransition { action, state }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translator::TranslationSource;

    fn translation() -> TranslatedMenu {
        TranslatedMenu {
            lines: vec!["Desserts".into(), "Tarte".into(), "Café".into()],
            source: TranslationSource::Secondary,
            aligned: true,
        }
    }

    fn translated_session() -> MenuSession {
        let mut session = MenuSession::new();
        session.scan(vec!["Desserts".into(), "Pie $4".into(), "Coffee".into()]);
        session.translate(translation()).expect("translate");
        session
    }

    #[test]
    fn walks_the_happy_path() {
        let mut session = translated_session();
        let items = session.select(&[1, 2]).expect("select").to_vec();
        assert_eq!(items, vec!["Pie $4", "Coffee"]);
        session.mark_logged().expect("logged");
        assert_eq!(session.state().name(), "logged");
        assert_eq!(session.selected(), Some(&items[..]));
        session.reset();
        assert_eq!(session.state().name(), "empty");
    }

    #[test]
    fn out_of_order_steps_are_rejected() {
        let mut session = MenuSession::new();
        assert_eq!(
            session.translate(translation()),
            Err(SessionError::InvalidTransition {
                action: "translate",
                state: "empty"
            })
        );
        assert_eq!(session.state().name(), "empty");

        session.scan(vec!["Coffee".into()]);
        assert!(matches!(
            session.select(&[0]),
            Err(SessionError::InvalidTransition { action: "select", .. })
        ));
        assert_eq!(
            session.mark_logged(),
            Err(SessionError::InvalidTransition {
                action: "log",
                state: "scanned"
            })
        );
        assert_eq!(session.state().name(), "scanned");
    }

    #[test]
    fn selection_validates_indices_and_headers() {
        let mut session = translated_session();
        assert_eq!(
            session.select(&[7]),
            Err(SessionError::IndexOutOfRange { index: 7, count: 3 })
        );
        assert_eq!(
            session.select(&[0]),
            Err(SessionError::Input(InputError::MenuHeader(
                "Desserts".to_string()
            )))
        );
        assert_eq!(session.select(&[]), Err(SessionError::NothingSelected));
        assert_eq!(session.state().name(), "translated");
    }

    #[test]
    fn only_a_pending_selection_can_be_logged() {
        let mut session = translated_session();
        assert_eq!(
            session.items_to_log(),
            Err(SessionError::InvalidTransition {
                action: "log",
                state: "translated"
            })
        );
        session.select(&[2]).expect("select");
        assert_eq!(session.items_to_log().expect("pending"), ["Coffee".to_string()]);
        session.mark_logged().expect("logged");
        assert!(session.items_to_log().is_err());
    }

    #[test]
    fn rescanning_starts_over() {
        let mut session = translated_session();
        session.select(&[2]).expect("select");
        session.scan(vec!["Tea".into()]);
        assert_eq!(session.state().name(), "scanned");
        assert!(session.selected().is_none());
    }
}
