use std::io::{self, BufRead};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use riddle_solver::gesture::GestureEvent;
use riddle_solver::{
    Config, ControllerHandle, CropRect, Event, PipelineState, Point, RunRequest, Services, Size,
    Snapshot, UploadFile,
};

#[derive(Parser, Debug)]
#[command(
    name = "riddle-solver",
    version,
    about = "Read a riddle from an image and ask a language model who it is about"
)]
struct Cli {
    /// Image to solve once (upload, crop, recognize, submit)
    image: Option<String>,

    /// Crop rectangle in display coordinates: x,y,width,height
    #[arg(long = "crop")]
    crop: Option<String>,

    /// Size the image is displayed at: width,height (default: natural size)
    #[arg(long = "display")]
    display: Option<String>,

    /// Model name (default from settings [model] name)
    #[arg(short = 'm', long = "model")]
    model: Option<String>,

    /// API key (overrides INFERENCE_API_KEY / OPENAI_API_KEY)
    #[arg(short = 'k', long = "key")]
    key: Option<String>,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<String>,

    /// Run the HTTP server
    #[arg(long = "serve")]
    serve: bool,

    /// Address to bind with --serve (default from settings [server] addr)
    #[arg(long = "addr")]
    addr: Option<String>,

    /// Submit through a running server instead of calling the model
    #[arg(long = "remote")]
    remote: Option<String>,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,

    /// Interactive mode
    #[arg(short = 'i', long = "interactive")]
    interactive: bool,
}

impl Cli {
    fn config(&self) -> Config {
        Config {
            model: self.model.clone(),
            key: self.key.clone(),
            settings_path: self.read_settings.clone(),
            remote: self.remote.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    riddle_solver::logging::init(cli.verbose)?;

    if cli.serve {
        if cli.remote.is_some() {
            return Err(anyhow!("--remote cannot be combined with --serve"));
        }
        let services = Services::load(&cli.config())?;
        let addr = cli
            .addr
            .clone()
            .unwrap_or_else(|| services.settings.server_addr.clone());
        return riddle_solver::server::run_server(
            services.settings,
            addr,
            riddle_solver::password_from_env(),
            services.submitter,
            services.recognizer,
        )
        .await;
    }
    if cli.interactive {
        return run_interactive(&cli).await;
    }

    let Some(path) = cli.image.as_deref() else {
        return Err(anyhow!(
            "no image given (pass a path, --interactive or --serve)"
        ));
    };
    let request = RunRequest {
        display: cli.display.as_deref().map(parse_size).transpose()?,
        crop: cli.crop.as_deref().map(parse_rect).transpose()?,
    };
    let services = Services::load(&cli.config())?;
    let mut handle = services.spawn_controller();
    let output = riddle_solver::run_once(&mut handle, read_upload(path)?, request).await?;
    println!("{}", output.text);
    println!("---");
    println!("{}", output.answer);
    Ok(())
}

fn read_upload(path: &str) -> Result<UploadFile> {
    let bytes = std::fs::read(path).with_context(|| format!("failed to read {}", path))?;
    Ok(UploadFile::new(bytes, None, Some(path)))
}

fn parse_numbers(value: &str, count: usize, what: &str) -> Result<Vec<f32>> {
    let numbers = value
        .split(',')
        .map(|part| part.trim().parse::<f32>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| anyhow!("invalid {} '{}': {}", what, value, err))?;
    if numbers.len() != count {
        return Err(anyhow!(
            "invalid {} '{}': expected {} comma-separated numbers",
            what,
            value,
            count
        ));
    }
    Ok(numbers)
}

fn parse_size(value: &str) -> Result<Size> {
    let numbers = parse_numbers(value, 2, "size")?;
    Ok(Size::new(numbers[0], numbers[1]))
}

fn parse_rect(value: &str) -> Result<CropRect> {
    let numbers = parse_numbers(value, 4, "crop")?;
    Ok(CropRect::new(numbers[0], numbers[1], numbers[2], numbers[3]))
}

fn parse_point(arg: &str) -> Result<Point> {
    let parts = arg.split_whitespace().collect::<Vec<_>>();
    let [x, y] = parts.as_slice() else {
        return Err(anyhow!("expected two numbers: x y"));
    };
    let x = x.parse::<f32>().map_err(|err| anyhow!("invalid x: {}", err))?;
    let y = y.parse::<f32>().map_err(|err| anyhow!("invalid y: {}", err))?;
    Ok(Point::new(x, y))
}

async fn run_interactive(cli: &Cli) -> Result<()> {
    use std::io::Write;

    let services = Services::load(&cli.config())?;
    let mut handle = services.spawn_controller();
    println!("Interactive mode. Use /quit or /exit to finish.");
    println!("Type /help to see available commands.");

    let mut line = String::new();
    let stdin = io::stdin();
    let mut stdin_lock = stdin.lock();
    loop {
        line.clear();
        print!("[{}] > ", handle.state().name());
        io::stdout().flush()?;
        if stdin_lock.read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if !input.starts_with('/') {
            eprintln!("commands start with '/'; try /help");
            continue;
        }
        match handle_interactive_command(input, &mut handle).await {
            Ok(true) => break,
            Ok(false) => {}
            Err(err) => eprintln!("error: {:#}", err),
        }
    }
    Ok(())
}

async fn handle_interactive_command(input: &str, handle: &mut ControllerHandle) -> Result<bool> {
    let trimmed = input.trim();
    let (command, arg) = trimmed
        .split_once(char::is_whitespace)
        .map(|(command, arg)| (command, arg.trim()))
        .unwrap_or((trimmed, ""));

    let snapshot = match command {
        "/quit" | "/exit" => return Ok(true),
        "/help" => {
            print_interactive_help();
            return Ok(false);
        }
        "/state" => handle.snapshot(),
        "/upload" => {
            if arg.is_empty() {
                return Err(anyhow!("usage: /upload <path>"));
            }
            handle.apply(Event::Upload(read_upload(arg)?)).await?
        }
        "/resize" => {
            let size = parse_size(&arg.split_whitespace().collect::<Vec<_>>().join(","))?;
            handle.apply(Event::Resize(size)).await?
        }
        "/crop" => handle.apply(Event::ToggleCrop).await?,
        "/down" => {
            let point = parse_point(arg)?;
            handle.apply(Event::Pointer(GestureEvent::Begin(point))).await?
        }
        "/move" => {
            let point = parse_point(arg)?;
            handle.apply(Event::Pointer(GestureEvent::Update(point))).await?
        }
        "/up" => handle.apply(Event::Pointer(GestureEvent::End)).await?,
        "/recognize" => handle.apply(Event::Recognize).await?,
        "/edit" => handle.apply(Event::EditText(arg.to_string())).await?,
        "/submit" => handle.apply(Event::Submit).await?,
        "/dismiss" => handle.apply(Event::Dismiss).await?,
        _ => {
            eprintln!("unknown command: {}", trimmed);
            return Ok(false);
        }
    };
    print_snapshot(&snapshot);
    Ok(false)
}

fn print_snapshot(snapshot: &Snapshot) {
    match &snapshot.state {
        PipelineState::Editing(text) => println!("text:\n{}", text),
        PipelineState::Done(answer) => println!("answer: {}", answer),
        PipelineState::Failed(err) => println!("error: {}", err),
        state => println!("state: {}", state.name()),
    }
    if let (Some(natural), Some(display)) = (snapshot.natural, snapshot.display) {
        println!(
            "image: {}x{} shown at {}x{}",
            natural.width, natural.height, display.width, display.height
        );
    }
    if snapshot.cropping {
        let crop = snapshot.crop;
        println!(
            "crop: x={} y={} w={} h={}",
            crop.x, crop.y, crop.width, crop.height
        );
    }
}

fn print_interactive_help() {
    println!("Commands:");
    println!("  /quit, /exit                 Exit interactive mode");
    println!("  /upload <path>               Load an image");
    println!("  /resize <w> <h>              Set the display size of the image");
    println!("  /crop                        Toggle crop mode (resets the selection)");
    println!("  /down <x> <y>                Start a drag at a display point");
    println!("  /move <x> <y>                Drag to a display point");
    println!("  /up                          Finish the drag");
    println!("  /recognize                   Run OCR on the selection (or whole image)");
    println!("  /edit <text>                 Replace the recognized text");
    println!("  /submit                      Ask the model who the riddle is about");
    println!("  /dismiss                     Dismiss the current error");
    println!("  /state                       Show the current state");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_cli_geometry() {
        assert_eq!(parse_size("600, 400").unwrap(), Size::new(600.0, 400.0));
        assert_eq!(
            parse_rect("50,50,100,50").unwrap(),
            CropRect::new(50.0, 50.0, 100.0, 50.0)
        );
        assert!(parse_rect("1,2,3").is_err());
        assert!(parse_size("a,b").is_err());
        assert_eq!(parse_point(" 10.5  20 ").unwrap(), Point::new(10.5, 20.0));
        assert!(parse_point("10").is_err());
    }
}
