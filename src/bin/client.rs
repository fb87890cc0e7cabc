use argh::FromArgs;
use sparkplug_relay::{
    CaptureError,
    capture::{Camera, Capture, CaptureScreen, CapturedPhoto, Notifier, Permission, RelayClient},
};
use std::path::PathBuf;

// defaults for the client
const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 3000;

#[derive(FromArgs)]
/// Spark plug client for uploading photos to the relay
struct ClientArgs {
    /// the host to connect to
    #[argh(option, short = 'h', default = "DEFAULT_HOST.to_string()")]
    host: String,

    /// the port to connect to
    #[argh(option, short = 'p', default = "DEFAULT_PORT")]
    port: u16,

    /// command to execute: "analyze" or "health"
    #[argh(subcommand)]
    command: ClientCommands,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum ClientCommands {
    Analyze(AnalyzeCommand),
    Health(HealthCommand),
}

#[derive(FromArgs)]
/// Upload a spark plug photo and print the diagnosis
#[argh(subcommand, name = "analyze")]
struct AnalyzeCommand {
    /// the path to the image
    #[argh(option, short = 'i')]
    image_path: PathBuf,
}

#[derive(FromArgs)]
/// Check that the relay is up
#[argh(subcommand, name = "health")]
struct HealthCommand {}

/// Camera that "captures" a photo already on disk.
struct FileCamera {
    path: PathBuf,
}

impl Camera for FileCamera {
    async fn request_permission(&mut self) -> Permission {
        Permission::Granted
    }

    async fn capture(&mut self) -> Result<Capture, CaptureError> {
        match tokio::fs::metadata(&self.path).await {
            Ok(meta) if meta.is_file() => Ok(Capture::Photo(CapturedPhoto {
                path: self.path.clone(),
            })),
            Ok(_) => Err(CaptureError(format!("{} is not a file", self.path.display()))),
            Err(e) => Err(CaptureError(format!("{}: {e}", self.path.display()))),
        }
    }
}

/// Prints alerts to stderr.
struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn alert(&mut self, title: &str, message: &str) {
        eprintln!("{title}: {message}");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args: ClientArgs = argh::from_env();

    // format the host and port
    let client = RelayClient::new(format!("http://{}:{}", args.host, args.port));

    match args.command {
        ClientCommands::Analyze(command) => {
            let camera = FileCamera {
                path: command.image_path,
            };
            let mut screen = CaptureScreen::new(camera, client, TerminalNotifier);
            screen.take_picture().await;

            match &screen.state().diagnosis {
                Some(diagnosis) => println!("Diagnosis: {diagnosis}"),
                None => return Err("no diagnosis was produced".into()),
            }
        }
        ClientCommands::Health(_) => {
            println!("{}", client.health().await?);
        }
    }

    Ok(())
}
