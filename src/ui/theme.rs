//! Dark theme matched to the scope background.

use crate::render::frame_renderer::CLEAR_COLOUR;
use iced::border::Border;
use iced::theme::palette;
use iced::widget::container;
use iced::{Background, Color, Theme};

const TEXT_PRIMARY: Color = Color::from_rgb(0.902, 0.910, 0.925);
const TEXT_SECONDARY: Color = Color::from_rgb(0.655, 0.671, 0.698);
const BORDER_SUBTLE: Color = Color::from_rgb(0.196, 0.204, 0.224);

// Trace tint at minimum drive and resonance.
const ACCENT_TRACE: Color = Color::from_rgb(0.0, 0.57, 1.0);
const ACCENT_SUCCESS: Color = Color::from_rgb(0.478, 0.557, 0.502);
const ACCENT_DANGER: Color = Color::from_rgb(0.557, 0.478, 0.478);

pub fn background() -> Color {
    let [r, g, b, a] = CLEAR_COLOUR;
    Color::from_rgba(r, g, b, a)
}

pub fn theme() -> Theme {
    Theme::custom(
        "Ladderscope".to_string(),
        palette::Palette {
            background: background(),
            text: TEXT_PRIMARY,
            primary: ACCENT_TRACE,
            success: ACCENT_SUCCESS,
            danger: ACCENT_DANGER,
        },
    )
}

pub fn secondary_text() -> Color {
    TEXT_SECONDARY
}

/// Translucent strip drawn over the reserved top margin.
pub fn status_strip(theme: &Theme) -> container::Style {
    let palette = theme.extended_palette();
    container::Style {
        background: Some(Background::Color(with_alpha(
            palette.background.weak.color,
            0.85,
        ))),
        text_color: Some(palette.background.base.text),
        border: Border {
            color: BORDER_SUBTLE,
            width: 1.0,
            radius: 0.0.into(),
        },
        ..Default::default()
    }
}

pub fn with_alpha(color: Color, alpha: f32) -> Color {
    Color {
        a: alpha.clamp(0.0, 1.0),
        ..color
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_background_matches_the_clear_colour() {
        let theme = theme();
        assert_eq!(theme.palette().background, background());
        assert!(theme.extended_palette().is_dark);
    }

    #[test]
    fn alpha_is_clamped() {
        assert_eq!(with_alpha(TEXT_PRIMARY, 2.0).a, 1.0);
        assert_eq!(with_alpha(TEXT_PRIMARY, -1.0).a, 0.0);
    }
}
