//! Maps a style token to its prompt instruction and background treatment.

use image::Rgb;
use tracing::warn;

use crate::color::parse_color;
use crate::constants::{
    DEFAULT_BACKGROUND_STYLE, INSTRUCTION_ISOLATED, INSTRUCTION_LIFESTYLE, INSTRUCTION_STUDIO,
    STYLE_IMAGE, STYLE_SOLID,
};

/// What ends up behind the subject in the final image.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BackgroundTarget {
    /// Keep the generated image as is
    None,
    /// Cut the subject out and leave the rest transparent
    Transparent,
    /// Cut the subject out and put it on an opaque fill
    SolidColor(Rgb<u8>),
}

/// Result of classifying a style token.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StyleDecision {
    /// Appended to the prompt request so the generator frames the subject right
    pub style_instruction: &'static str,
    /// Background treatment applied after generation
    pub background_target: BackgroundTarget,
}

impl StyleDecision {
    /// True whenever the background has to be segmented away.
    pub fn needs_background_removal(&self) -> bool {
        self.background_target != BackgroundTarget::None
    }
}

/// Classifies a raw style token. Never fails: anything unrecognised is
/// treated as a request for a transparent background.
pub fn classify(raw_style: &str) -> StyleDecision {
    match raw_style {
        STYLE_IMAGE => StyleDecision {
            style_instruction: INSTRUCTION_LIFESTYLE,
            background_target: BackgroundTarget::None,
        },
        STYLE_SOLID => StyleDecision {
            style_instruction: INSTRUCTION_STUDIO,
            background_target: BackgroundTarget::None,
        },
        other => {
            let background_target = match parse_color(other) {
                Some(color) => BackgroundTarget::SolidColor(color),
                None => {
                    if other != DEFAULT_BACKGROUND_STYLE {
                        warn!("Invalid color code: {other:?}, falling back to transparent.");
                    }
                    BackgroundTarget::Transparent
                }
            };
            StyleDecision {
                style_instruction: INSTRUCTION_ISOLATED,
                background_target,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_and_solid_keep_the_generated_background() {
        for style in ["image", "solid"] {
            let decision = classify(style);
            assert!(!decision.needs_background_removal());
            assert_eq!(decision.background_target, BackgroundTarget::None);
        }
        assert_eq!(classify("image").style_instruction, INSTRUCTION_LIFESTYLE);
        assert_eq!(classify("solid").style_instruction, INSTRUCTION_STUDIO);
    }

    #[test]
    fn colors_become_solid_fills() {
        let decision = classify("#FF0000");
        assert!(decision.needs_background_removal());
        assert_eq!(
            decision.background_target,
            BackgroundTarget::SolidColor(Rgb([255, 0, 0]))
        );
        assert_eq!(decision.style_instruction, INSTRUCTION_ISOLATED);

        let decision = classify("red");
        assert_eq!(
            decision.background_target,
            BackgroundTarget::SolidColor(Rgb([255, 0, 0]))
        );
    }

    #[test]
    fn everything_else_is_transparent() {
        for style in ["transparent", "not-a-color", "", "Image", "#12"] {
            let decision = classify(style);
            assert!(decision.needs_background_removal(), "{style:?}");
            assert_eq!(decision.background_target, BackgroundTarget::Transparent);
            assert_eq!(decision.style_instruction, INSTRUCTION_ISOLATED);
        }
    }
}
