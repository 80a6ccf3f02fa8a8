/// How consecutive clips are joined.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transition {
    /// End to end, no overlap.
    Cut,
    /// Each clip after the first starts `padding` seconds before the previous ends
    /// and fades in over that overlap.
    Crossfade { padding: f64 },
}

impl Transition {
    pub fn from_settings(crossfade: bool, padding: f64) -> Self {
        if crossfade && padding > 0.0 {
            Transition::Crossfade { padding }
        } else {
            Transition::Cut
        }
    }

    pub fn overlap(&self) -> f64 {
        match self {
            Transition::Cut => 0.0,
            Transition::Crossfade { padding } => *padding,
        }
    }
}

/// Start offset of each clip on the final timeline plus the total length.
/// `fades[i]` is how long clip `i` overlaps the one before it (always 0 for the
/// first clip and for cuts).
#[derive(Debug, Clone, PartialEq)]
pub struct Schedule {
    pub starts: Vec<f64>,
    pub fades: Vec<f64>,
    pub total: f64,
}

/// Lays clips end to end, pulling each one `padding` seconds back under a
/// crossfade. The overlap between a pair never exceeds half of either clip, so
/// starts strictly increase and neighbouring fades never run into each other.
pub fn schedule(durations: &[f64], transition: Transition) -> Schedule {
    let padding = transition.overlap();
    let mut starts = Vec::with_capacity(durations.len());
    let mut fades = Vec::with_capacity(durations.len());
    let mut offset = 0.0;
    let mut prev: Option<f64> = None;

    for &d in durations {
        let fade = match prev {
            Some(p) => padding.min(p / 2.0).min(d / 2.0).max(0.0),
            None => 0.0,
        };
        offset -= fade;
        starts.push(offset);
        fades.push(fade);
        offset += d;
        prev = Some(d);
    }

    Schedule {
        starts,
        fades,
        total: offset,
    }
}

/// Snaps a duration to a whole number of frames (at least one), matching the
/// length ffmpeg actually encodes for a clip cut with `-t`.
pub fn frame_aligned(duration: f64, fps: u32) -> f64 {
    let fps = f64::from(fps.max(1));
    (duration * fps).round().max(1.0) / fps
}
