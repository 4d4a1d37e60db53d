//! Initial generation parameters
//!
//! The parameter set submitted alongside the SDP offer. Callers hand in a
//! partial overlay; it is merged over the documented defaults by a pure
//! function so first-frame behavior is explicit and testable.

use serde::{Deserialize, Serialize};

/// Input source mode for the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputMode {
    Video,
    Text,
}

/// Weighted text prompt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptItem {
    pub text: String,
    pub weight: u32,
}

impl PromptItem {
    /// Single-prompt convention: full weight
    pub fn new(text: impl Into<String>) -> Self {
        Self::weighted(text, 100)
    }

    pub fn weighted(text: impl Into<String>, weight: u32) -> Self {
        Self {
            text: text.into(),
            weight,
        }
    }
}

/// Full parameter set sent with the SDP offer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitialParameters {
    pub input_mode: InputMode,
    pub prompts: Vec<PromptItem>,
    pub prompt_interpolation_method: String,
    pub noise_scale: f64,
    pub noise_controller: bool,
    pub denoising_step_list: Vec<u32>,
    pub manage_cache: bool,
}

impl Default for InitialParameters {
    fn default() -> Self {
        Self {
            input_mode: InputMode::Video,
            prompts: vec![PromptItem::weighted("", 100)],
            prompt_interpolation_method: "linear".to_string(),
            noise_scale: 0.7,
            noise_controller: true,
            denoising_step_list: vec![1000, 750],
            manage_cache: true,
        }
    }
}

/// Caller-supplied partial parameters; unset fields take the defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InitialParametersOverlay {
    pub input_mode: Option<InputMode>,
    pub prompts: Option<Vec<PromptItem>>,
    pub prompt_interpolation_method: Option<String>,
    pub noise_scale: Option<f64>,
    pub noise_controller: Option<bool>,
    pub denoising_step_list: Option<Vec<u32>>,
    pub manage_cache: Option<bool>,
}

impl InitialParametersOverlay {
    /// Overlay with just an initial prompt
    pub fn with_prompt(text: impl Into<String>) -> Self {
        Self {
            prompts: Some(vec![PromptItem::new(text)]),
            ..Self::default()
        }
    }
}

/// Merge a caller overlay over the session defaults
pub fn merge_parameters(overlay: &InitialParametersOverlay) -> InitialParameters {
    let mut params = InitialParameters::default();

    if let Some(mode) = overlay.input_mode {
        params.input_mode = mode;
    }
    if let Some(prompts) = &overlay.prompts {
        params.prompts = prompts.clone();
    }
    if let Some(method) = &overlay.prompt_interpolation_method {
        params.prompt_interpolation_method = method.clone();
    }
    if let Some(scale) = overlay.noise_scale {
        params.noise_scale = scale;
    }
    if let Some(controller) = overlay.noise_controller {
        params.noise_controller = controller;
    }
    if let Some(steps) = &overlay.denoising_step_list {
        params.denoising_step_list = steps.clone();
    }
    if let Some(manage) = overlay.manage_cache {
        params.manage_cache = manage;
    }

    params
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_overlay_yields_defaults() {
        let params = merge_parameters(&InitialParametersOverlay::default());
        assert_eq!(params, InitialParameters::default());
        assert_eq!(params.input_mode, InputMode::Video);
        assert_eq!(params.prompts, vec![PromptItem::weighted("", 100)]);
        assert_eq!(params.prompt_interpolation_method, "linear");
        assert_eq!(params.noise_scale, 0.7);
        assert!(params.noise_controller);
        assert_eq!(params.denoising_step_list, vec![1000, 750]);
        assert!(params.manage_cache);
    }

    #[test]
    fn overlay_fields_win_and_the_rest_stay_default() {
        let overlay = InitialParametersOverlay {
            prompts: Some(vec![PromptItem::new("a dreamlike corridor")]),
            noise_scale: Some(0.4),
            ..Default::default()
        };

        let params = merge_parameters(&overlay);
        assert_eq!(params.prompts[0].text, "a dreamlike corridor");
        assert_eq!(params.prompts[0].weight, 100);
        assert_eq!(params.noise_scale, 0.4);
        // untouched fields keep defaults
        assert_eq!(params.denoising_step_list, vec![1000, 750]);
        assert!(params.manage_cache);
    }

    #[test]
    fn prompt_weights_need_not_sum_to_hundred() {
        let overlay = InitialParametersOverlay {
            prompts: Some(vec![
                PromptItem::weighted("forest", 80),
                PromptItem::weighted("neon city", 40),
            ]),
            ..Default::default()
        };
        let params = merge_parameters(&overlay);
        assert_eq!(params.prompts.len(), 2);
        assert_eq!(params.prompts[1].weight, 40);
    }
}
