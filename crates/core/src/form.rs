//! Form controls of the console and their enablement rules.

use openai_realtime_types::Voice;

/// Name shown for the assistant a session starts with.
pub const GENERIC_ASSISTANT_LABEL: &str = "Generic Assistant";

/// Range of sampling temperatures the realtime API accepts.
pub const TEMPERATURE_RANGE: std::ops::RangeInclusive<f32> = 0.6..=1.2;

/// Coarse UI state; decides which controls accept input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputState {
    Working,
    ReadyToStart,
    ReadyToStop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Start,
    Stop,
    Language,
    Assistant,
    AzureToggle,
    ChatOnlyToggle,
    Chat,
    SendText,
    DeleteItem,
    Voice,
    Temperature,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum FormError {
    #[error("{0:?} is disabled right now")]
    Disabled(Control),
    #[error("temperature {0} is outside 0.6..=1.2")]
    TemperatureOutOfRange(f32),
}

#[derive(Debug, Clone)]
pub struct Form {
    pub voice: Voice,
    pub temperature: f32,
    pub language: String,
    pub assistant: String,
    pub azure: bool,
    pub chat_only: bool,
    input_state: InputState,
}

impl Default for Form {
    fn default() -> Self {
        Self {
            voice: Voice::Alloy,
            temperature: 0.8,
            language: "English".to_string(),
            assistant: GENERIC_ASSISTANT_LABEL.to_string(),
            azure: false,
            chat_only: false,
            input_state: InputState::ReadyToStart,
        }
    }
}

impl Form {
    pub fn input_state(&self) -> InputState {
        self.input_state
    }

    pub fn set_input_state(&mut self, state: InputState) {
        tracing::debug!(?state, "Form input state");
        self.input_state = state;
    }

    /// Voice and temperature stay live for the whole session; session setup
    /// controls only accept input before start, conversation controls only
    /// while a session runs.
    pub fn is_enabled(&self, control: Control) -> bool {
        match control {
            Control::Start
            | Control::Language
            | Control::Assistant
            | Control::AzureToggle
            | Control::ChatOnlyToggle => self.input_state == InputState::ReadyToStart,
            Control::Stop | Control::Chat | Control::SendText | Control::DeleteItem => {
                self.input_state == InputState::ReadyToStop
            }
            Control::Voice | Control::Temperature => true,
        }
    }

    fn ensure_enabled(&self, control: Control) -> Result<(), FormError> {
        if self.is_enabled(control) {
            Ok(())
        } else {
            Err(FormError::Disabled(control))
        }
    }

    pub fn set_voice(&mut self, voice: Voice) {
        self.voice = voice;
    }

    pub fn set_temperature(&mut self, temperature: f32) -> Result<(), FormError> {
        if !TEMPERATURE_RANGE.contains(&temperature) {
            return Err(FormError::TemperatureOutOfRange(temperature));
        }
        self.temperature = temperature;
        Ok(())
    }

    pub fn set_language(&mut self, language: &str) -> Result<(), FormError> {
        self.ensure_enabled(Control::Language)?;
        self.language = language.trim().to_string();
        Ok(())
    }

    pub fn set_azure(&mut self, azure: bool) -> Result<(), FormError> {
        self.ensure_enabled(Control::AzureToggle)?;
        self.azure = azure;
        Ok(())
    }

    pub fn set_chat_only(&mut self, chat_only: bool) -> Result<(), FormError> {
        self.ensure_enabled(Control::ChatOnlyToggle)?;
        self.chat_only = chat_only;
        Ok(())
    }
}
