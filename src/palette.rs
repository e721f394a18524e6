use crossterm::style::Color;

/// A channel counts as lit once it is brighter than a third of full scale.
pub const CHANNEL_THRESHOLD: u8 = 85;

/// One of the eight basic terminal colors, numbered the way ANSI numbers them
/// (bit 0 red, bit 1 green, bit 2 blue).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColorId(u8);

impl ColorId {
    pub const BLACK: Self = Self(0);
    pub const RED: Self = Self(1);
    pub const GREEN: Self = Self(2);
    pub const YELLOW: Self = Self(3);
    pub const BLUE: Self = Self(4);
    pub const MAGENTA: Self = Self(5);
    pub const CYAN: Self = Self(6);
    pub const WHITE: Self = Self(7);

    pub fn index(self) -> usize {
        usize::from(self.0)
    }

    /// The bold attribute turns these into the bright variants on most terminals.
    pub fn terminal_color(self) -> Color {
        PALETTE[self.index()]
    }
}

const PALETTE: [Color; 8] = [
    Color::Black,
    Color::DarkRed,
    Color::DarkGreen,
    Color::DarkYellow,
    Color::DarkBlue,
    Color::DarkMagenta,
    Color::DarkCyan,
    Color::Grey,
];

pub fn quantize(rgb: [u8; 3]) -> ColorId {
    let [r, g, b] = rgb;
    let bit = |channel: u8| u8::from(channel > CHANNEL_THRESHOLD);
    ColorId(bit(r) | bit(g) << 1 | bit(b) << 2)
}
