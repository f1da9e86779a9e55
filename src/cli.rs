use crate::quality::QualityMode;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "retrowave", about = "Real-time audio visualizer core with adaptive quality")]
pub struct Cli {
    /// Play and visualize an audio file (MP3, WAV, FLAC, OGG, AAC)
    #[arg(long, conflicts_with_all = ["mic", "display", "stream", "station"])]
    pub file: Option<PathBuf>,

    /// Capture a microphone, optionally by device name
    #[arg(long, num_args = 0..=1, default_missing_value = "", conflicts_with_all = ["display", "stream", "station"])]
    pub mic: Option<String>,

    /// Capture the system audio output
    #[arg(long, conflicts_with_all = ["stream", "station"])]
    pub display: bool,

    /// Live stream URL
    #[arg(long, conflicts_with = "station")]
    pub stream: Option<String>,

    /// Live stream from the config's station list (1-based)
    #[arg(long)]
    pub station: Option<usize>,

    /// Visual mode (bars, particles, grid, neonTunnel, ribbon, codeEditor)
    #[arg(short, long, default_value = "neonTunnel")]
    pub mode: String,

    /// Quality mode
    #[arg(short, long, value_enum, default_value_t = QualityMode::Auto)]
    pub quality: QualityMode,

    /// Visual sensitivity (typically 0-2)
    #[arg(long, default_value_t = 1.0)]
    pub sensitivity: f32,

    /// Visual intensity (typically 0-1.5)
    #[arg(long, default_value_t = 1.0)]
    pub intensity: f32,

    /// Analyser smoothing time constant (0-0.98)
    #[arg(long, default_value_t = 0.75)]
    pub smoothing: f32,

    /// Output volume (0-1)
    #[arg(long, default_value_t = 1.0)]
    pub volume: f32,

    /// Play capture sources through the speakers
    #[arg(long)]
    pub monitor: bool,

    /// Draw the faint grid overlay on every mode but the tunnel
    #[arg(long)]
    pub overlay: bool,

    /// Start the rhythm game on the grid. There is no lane input here, so
    /// this only previews spawning and every target ends as a miss.
    #[arg(long)]
    pub game: bool,

    /// Frame rate of the render loop
    #[arg(long, default_value_t = 60)]
    pub fps: u32,

    /// Stop after this many seconds
    #[arg(long)]
    pub duration: Option<f64>,

    /// Surface size in logical pixels
    #[arg(long, default_value_t = 1280)]
    pub width: u32,

    #[arg(long, default_value_t = 720)]
    pub height: u32,

    /// Device pixel ratio of the display
    #[arg(long, default_value_t = 1.0)]
    pub pixel_ratio: f32,

    /// Config file (default: ./retrowave.toml, then the user config directory)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Write the end-of-run report as JSON to this path
    #[arg(long)]
    pub stats_json: Option<PathBuf>,

    /// List capture devices and exit
    #[arg(long)]
    pub list_sources: bool,

    /// List visual modes and exit
    #[arg(long)]
    pub list_modes: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn bare_mic_flag_means_default_device() {
        let cli = Cli::parse_from(["retrowave", "--mic"]);
        assert_eq!(cli.mic.as_deref(), Some(""));

        let cli = Cli::parse_from(["retrowave", "--mic", "USB Audio"]);
        assert_eq!(cli.mic.as_deref(), Some("USB Audio"));
    }

    #[test]
    fn sources_are_exclusive() {
        assert!(Cli::try_parse_from(["retrowave", "--file", "a.mp3", "--display"]).is_err());
        assert!(Cli::try_parse_from(["retrowave", "--stream", "http://x", "--station", "1"]).is_err());
    }

    #[test]
    fn game_help_says_there_is_no_lane_input() {
        let command = Cli::command();
        let game = command
            .get_arguments()
            .find(|arg| arg.get_id() == "game")
            .unwrap();
        let help = game.get_long_help().or(game.get_help()).unwrap().to_string();
        assert!(help.contains("no lane input"));
    }

    #[test]
    fn defaults() {
        let cli = Cli::parse_from(["retrowave"]);
        assert_eq!(cli.mode, "neonTunnel");
        assert_eq!(cli.quality, QualityMode::Auto);
        assert_eq!(cli.fps, 60);
        assert!(cli.file.is_none() && cli.mic.is_none() && !cli.display);
    }
}
