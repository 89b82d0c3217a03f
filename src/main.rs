//! HP 3000 Emulator - CLI Entry Point
//!
//! Commands:
//! - `hp3000-emu run <program>` - Run an image or ASM file
//! - `hp3000-emu asm <source>` - Assemble to an image
//! - `hp3000-emu disasm <image>` - Disassemble an image
//!
//! Log output is controlled by `HP3000_LOG` (default `warn`).

use clap::{Parser, Subcommand};
use hp3000::asm::disasm::{disassemble_program, format_line};
use hp3000::asm::image::format_image;
use hp3000::io::{ConsoleTty, DeviceBus, DeviceRegistry, LinePrinter};
use hp3000::{assemble, load_image, save_image, Cpu, CpuState, Program, Registers};
use serde::Serialize;
use std::fmt::Display;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "hp3000-emu")]
#[command(author = "Yigit")]
#[command(version = "0.1.0")]
#[command(about = "An instruction-level emulator of the HP 3000 stack minicomputer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program until it halts
    Run {
        /// Path to the image or ASM file to execute
        program: PathBuf,
        /// Start address in octal (default: program origin)
        #[arg(short, long, value_parser = parse_octal)]
        start: Option<u16>,
        /// Maximum number of instructions to run
        #[arg(short, long, default_value = "10000")]
        max_steps: u64,
        /// Print every instruction as it executes
        #[arg(short, long)]
        trace: bool,
        /// Print the final machine state as JSON
        #[arg(long)]
        json: bool,
        /// File receiving line printer output
        #[arg(long)]
        lpt: Option<PathBuf>,
    },
    /// Assemble source to an image
    Asm {
        /// Path to the source file
        source: PathBuf,
        /// Output image file (default: standard output)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Disassemble an image to readable text
    Disasm {
        /// Path to the image file
        image: PathBuf,
    },
}

/// Final state printed by `run --json`.
#[derive(Serialize)]
struct RunReport<'a> {
    state: CpuState,
    halt_reason: Option<&'a str>,
    steps: u64,
    cycles: u64,
    registers: &'a Registers,
}

fn main() {
    let env = env_logger::Env::default().filter_or("HP3000_LOG", "warn");
    env_logger::init_from_env(env);

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            program,
            start,
            max_steps,
            trace,
            json,
            lpt,
        } => {
            run_program(&program, start, max_steps, trace, json, lpt.as_deref());
        }
        Commands::Asm { source, output } => {
            assemble_file(&source, output.as_deref());
        }
        Commands::Disasm { image } => {
            disassemble_file(&image);
        }
    }
}

fn fail(context: &str, err: impl Display) -> ! {
    eprintln!("❌ {}: {}", context, err);
    std::process::exit(1);
}

fn parse_octal(text: &str) -> Result<u16, String> {
    u16::from_str_radix(text, 8)
        .ok()
        .filter(|&addr| addr <= 0x7FFF)
        .ok_or_else(|| format!("invalid octal address: {}", text))
}

/// Assemble `.asm` sources on the fly; anything else is an image.
fn load_program(path: &Path) -> Program {
    if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("asm")) {
        let source = std::fs::read_to_string(path)
            .unwrap_or_else(|e| fail("Failed to read file", e));
        assemble(&source).unwrap_or_else(|e| fail("Assembly error", e))
    } else {
        load_image(path).unwrap_or_else(|e| fail("Failed to load image", e))
    }
}

fn build_bus(lpt: Option<&Path>) -> DeviceBus {
    let mut devices = DeviceRegistry::new();
    if let Err(e) = devices.add("tty", Box::new(ConsoleTty::stdout())) {
        fail("Failed to attach console", e);
    }
    if let Some(path) = lpt {
        let attached = devices
            .add("lpt", Box::new(LinePrinter::new()))
            .and_then(|()| devices.attach("lpt", path, true));
        if let Err(e) = attached {
            fail("Failed to attach line printer", e);
        }
    }
    DeviceBus::new(devices)
}

fn run_program(
    path: &Path,
    start: Option<u16>,
    max_steps: u64,
    trace: bool,
    json: bool,
    lpt: Option<&Path>,
) {
    let program = load_program(path);
    if program.is_empty() {
        fail("Nothing to run", path.display());
    }

    let mut cpu = Cpu::new();
    program.load_into(&mut cpu.mem);
    cpu.reset(start.unwrap_or(program.origin));
    let mut bus = build_bus(lpt);

    let steps = if trace {
        let mut steps = 0;
        while steps < max_steps {
            let pc = cpu.regs.pc;
            let word = cpu.mem.read(pc);
            let running = cpu.step(&mut bus);
            println!(
                "{:<32} SR={} RA={:06o} RB={:06o} X={:06o} {}",
                format_line(pc, word),
                cpu.regs.sr,
                cpu.regs.ra,
                cpu.regs.rb,
                cpu.regs.x,
                cpu.regs.sta
            );
            if !running {
                break;
            }
            steps += 1;
        }
        steps
    } else {
        cpu.run(&mut bus, max_steps)
    };

    if let Err(e) = bus.devices.flush_all() {
        eprintln!("⚠️  Device flush failed: {}", e);
    }
    if lpt.is_some() {
        if let Err(e) = bus.devices.detach("lpt") {
            eprintln!("⚠️  Line printer detach failed: {}", e);
        }
    }
    let missing: Vec<String> = bus.missing_codes().map(|c| c.to_string()).collect();
    if !missing.is_empty() {
        eprintln!("⚠️  No device for code(s): {}", missing.join(", "));
    }

    if json {
        let report = RunReport {
            state: cpu.state,
            halt_reason: cpu.halt_reason(),
            steps,
            cycles: cpu.cycles,
            registers: &cpu.regs,
        };
        match serde_json::to_string_pretty(&report) {
            Ok(text) => println!("{}", text),
            Err(e) => fail("Failed to encode state", e),
        }
    } else {
        let regs = &cpu.regs;
        println!();
        println!("━━━ Result ━━━");
        println!("Steps: {}", steps);
        println!("State: {:?}", cpu.state);
        if let Some(reason) = cpu.halt_reason() {
            println!("Reason: {}", reason);
        }
        println!("P={:05o}  X={:06o}  STA={}", regs.pc, regs.x, regs.sta);
        println!(
            "SR={}  depth={}  RA={:06o} RB={:06o} RC={:06o} RD={:06o}",
            regs.sr, regs.depth, regs.ra, regs.rb, regs.rc, regs.rd
        );
        if cpu.is_running() {
            println!("Step budget of {} exhausted", max_steps);
        }
    }

    if cpu.state == CpuState::Error {
        std::process::exit(1);
    }
}

fn assemble_file(source_path: &Path, output: Option<&Path>) {
    let source = std::fs::read_to_string(source_path)
        .unwrap_or_else(|e| fail("Failed to read file", e));
    let program = assemble(&source).unwrap_or_else(|e| fail("Assembly error", e));

    match output {
        Some(path) => {
            if let Err(e) = save_image(path, &program) {
                fail("Failed to write image", e);
            }
            eprintln!("✓ Assembled {} words to {}", program.len(), path.display());
        }
        None => print!("{}", format_image(&program)),
    }
}

fn disassemble_file(image_path: &Path) {
    let program = load_image(image_path).unwrap_or_else(|e| fail("Failed to load image", e));
    print!("{}", disassemble_program(&program));
}
