use ratatui::style::Color;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThemeKind {
    #[default]
    Default,
    Light,
    Ocean,
}

impl ThemeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ThemeKind::Default => "default",
            ThemeKind::Light => "light",
            ThemeKind::Ocean => "ocean",
        }
    }

    pub fn palette(self) -> Palette {
        match self {
            ThemeKind::Default => Palette {
                bg: Color::Rgb(11, 18, 32),
                surface: Color::Rgb(17, 26, 46),
                border: Color::Rgb(71, 85, 105),
                title: Color::Rgb(191, 219, 254),
                text: Color::Rgb(226, 232, 240),
                muted: Color::Rgb(148, 163, 184),
                accent: Color::Rgb(56, 189, 248),
                ok: Color::Rgb(34, 197, 94),
                warn: Color::Rgb(245, 158, 11),
                critical: Color::Rgb(239, 68, 68),
                idle_cell: Color::Rgb(51, 65, 85),
                fault_cell: Color::Rgb(239, 68, 68),
            },
            ThemeKind::Light => Palette {
                bg: Color::Rgb(248, 250, 252),
                surface: Color::Rgb(255, 255, 255),
                border: Color::Rgb(203, 213, 225),
                title: Color::Rgb(30, 64, 175),
                text: Color::Rgb(15, 23, 42),
                muted: Color::Rgb(100, 116, 139),
                accent: Color::Rgb(37, 99, 235),
                ok: Color::Rgb(22, 163, 74),
                warn: Color::Rgb(217, 119, 6),
                critical: Color::Rgb(220, 38, 38),
                idle_cell: Color::Rgb(203, 213, 225),
                fault_cell: Color::Rgb(239, 68, 68),
            },
            ThemeKind::Ocean => Palette {
                bg: Color::Rgb(8, 28, 41),
                surface: Color::Rgb(12, 42, 60),
                border: Color::Rgb(30, 94, 120),
                title: Color::Rgb(165, 243, 252),
                text: Color::Rgb(224, 242, 254),
                muted: Color::Rgb(125, 171, 191),
                accent: Color::Rgb(34, 211, 238),
                ok: Color::Rgb(45, 212, 191),
                warn: Color::Rgb(251, 191, 36),
                critical: Color::Rgb(248, 113, 113),
                idle_cell: Color::Rgb(30, 58, 76),
                fault_cell: Color::Rgb(239, 68, 68),
            },
        }
    }
}

impl FromStr for ThemeKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "default" | "dark" => Ok(ThemeKind::Default),
            "light" => Ok(ThemeKind::Light),
            "ocean" => Ok(ThemeKind::Ocean),
            other => Err(format!(
                "unknown theme '{other}' (expected default, light or ocean)"
            )),
        }
    }
}

impl fmt::Display for ThemeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub bg: Color,
    pub surface: Color,
    pub border: Color,
    pub title: Color,
    pub text: Color,
    pub muted: Color,
    pub accent: Color,
    pub ok: Color,
    pub warn: Color,
    pub critical: Color,
    pub idle_cell: Color,
    pub fault_cell: Color,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fault_and_idle_cells_stay_distinct_in_every_theme() {
        for kind in [ThemeKind::Default, ThemeKind::Light, ThemeKind::Ocean] {
            let palette = kind.palette();
            assert_ne!(palette.idle_cell, palette.fault_cell, "{kind}");
            assert_ne!(palette.bg, palette.text, "{kind}");
        }
    }

    #[test]
    fn theme_names_round_trip() {
        for kind in [ThemeKind::Default, ThemeKind::Light, ThemeKind::Ocean] {
            assert_eq!(kind.as_str().parse::<ThemeKind>(), Ok(kind));
        }
        assert!("neon".parse::<ThemeKind>().is_err());
    }
}
