use std::{
    io::{self, BufRead, Write},
    path::PathBuf,
};

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use log::{debug, info};

use chip8_core::{
    chip8::{Chip8, Chip8Runner, Display, Quirks, RunnerConfig, Status},
    debugger::{Cli as DebugCli, Command as DebugCommand, CommandResult, Executor},
};

/// Headless CHIP-8 interpreter.
///
/// Set RUST_LOG=trace to log every executed instruction.
#[derive(Parser)]
#[command(about)]
struct Cli {
    #[command(subcommand)]
    command: Mode,
}

#[derive(Subcommand)]
enum Mode {
    /// Run a ROM and print the final screen and registers
    Run {
        #[command(flatten)]
        machine: MachineArgs,

        /// Number of CPU cycles to execute (timers tick at --timer-hz relative to --cpu-hz)
        #[arg(long, conflicts_with = "seconds")]
        cycles: Option<usize>,

        /// Emulated time to run for
        #[arg(long, default_value = "5.0")]
        seconds: f32,
    },
    /// Interactive debugger reading commands from stdin
    Debug {
        #[command(flatten)]
        machine: MachineArgs,
    },
}

#[derive(Args)]
struct MachineArgs {
    /// Path to the CHIP-8 ROM file
    rom_path: PathBuf,

    #[arg(long, default_value = "700")]
    cpu_hz: f32,

    #[arg(long, default_value = "60")]
    timer_hz: f32,

    /// Seed for the CXNN random source
    #[arg(long)]
    seed: Option<u64>,

    /// Enable every COSMAC VIP quirk
    #[arg(long)]
    vip: bool,

    #[arg(long)]
    shift_uses_vy: bool,

    #[arg(long)]
    logic_resets_vf: bool,

    #[arg(long)]
    load_store_increments_i: bool,

    #[arg(long)]
    clip_sprites: bool,

    #[arg(long)]
    key_wait_on_release: bool,

    #[arg(long)]
    display_wait: bool,
}

impl MachineArgs {
    fn quirks(&self) -> Quirks {
        if self.vip {
            return Quirks::cosmac_vip();
        }

        Quirks {
            shift_uses_vy: self.shift_uses_vy,
            logic_resets_vf: self.logic_resets_vf,
            load_store_increments_i: self.load_store_increments_i,
            clip_sprites: self.clip_sprites,
            key_wait_on_release: self.key_wait_on_release,
            display_wait: self.display_wait,
        }
    }

    fn config(&self) -> anyhow::Result<RunnerConfig> {
        if !(self.cpu_hz > 0.0 && self.timer_hz > 0.0) {
            bail!("--cpu-hz and --timer-hz must be positive");
        }

        Ok(RunnerConfig {
            cpu_hz: self.cpu_hz,
            timer_hz: self.timer_hz,
        })
    }

    /// Reads the ROM and builds a runner with it loaded.
    fn build(&self) -> anyhow::Result<(Chip8Runner, Vec<u8>)> {
        let rom = std::fs::read(&self.rom_path).context("Failed to read ROM file")?;

        let quirks = self.quirks();
        let mut chip8 = match self.seed {
            Some(seed) => Chip8::with_seed(quirks, seed),
            None => Chip8::with_quirks(quirks),
        };
        chip8
            .load(&rom)
            .context("Failed to load ROM into CHIP-8 memory")?;
        info!("loaded {} ({} bytes)", self.rom_path.display(), rom.len());
        debug!("quirks: {:?}", chip8.quirks());

        Ok((Chip8Runner::with_config(chip8, self.config()?), rom))
    }
}

fn render_display(display: &Display<bool>) -> String {
    display
        .iter()
        .map(|row| {
            row.iter()
                .map(|&pixel| if pixel { '█' } else { ' ' })
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_registers(chip8: &Chip8) -> String {
    let mut out = format!(
        "PC: {:03X}  I: {:03X}  DT: {:02X}  ST: {:02X}  SP: {}\n",
        chip8.pc(),
        chip8.i(),
        chip8.delay_timer(),
        chip8.sound_timer(),
        chip8.stack().sp()
    );

    let v = chip8.v();
    for idx in 0..8 {
        out.push_str(&format!(
            "V{:X}: {:02X}   V{:X}: {:02X}\n",
            idx,
            v[idx],
            idx + 8,
            v[idx + 8]
        ));
    }

    if let Some(x) = chip8.awaiting_key() {
        out.push_str(&format!("Waiting for key into V{x:X}\n"));
    }
    if let Status::Error(err) = chip8.status() {
        out.push_str(&format!("Halted: {err}\n"));
    }
    out
}

fn run(machine: &MachineArgs, cycles: Option<usize>, seconds: f32) -> anyhow::Result<()> {
    let (mut runner, _) = machine.build()?;
    let config = runner.config();

    let result = match cycles {
        Some(cycles) => {
            // Keep timers in step with the instruction count
            let cycles_per_tick = (config.cpu_hz / config.timer_hz).max(1.0) as usize;
            let mut done = 0;
            let mut outcome = Ok(());
            while done < cycles {
                let batch = cycles_per_tick.min(cycles - done);
                match runner.run_cycles(batch) {
                    Ok(retired) if retired < batch => break,
                    Ok(_) => {}
                    Err(err) => {
                        outcome = Err(err);
                        break;
                    }
                }
                runner.tick_timers();
                done += batch;
            }
            outcome
        }
        None => {
            let frame = 1.0 / config.timer_hz;
            let frames = (seconds / frame).ceil() as usize;
            (0..frames).try_for_each(|_| runner.update(frame).map(|_| ()))
        }
    };

    let chip8 = runner.chip8_ref();
    println!("{}", render_display(chip8.display()));
    print!("{}", render_registers(chip8));

    result.context("Chip8 Execution error")
}

fn debug(machine: &MachineArgs) -> anyhow::Result<()> {
    let (runner, rom) = machine.build()?;
    let mut executor = Executor::new(runner, rom);
    let mut last_command: Option<DebugCommand> = None;

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    print!("> ");
    stdout.flush()?;

    for line in stdin.lock().lines() {
        let line = line.context("Failed to read command")?;

        let command = if line.trim().is_empty() {
            last_command.clone()
        } else {
            match DebugCli::try_parse_from(line.split_whitespace()) {
                Ok(cli) => Some(cli.command),
                Err(e) => {
                    println!("{e}");
                    None
                }
            }
        };

        if let Some(command) = command {
            last_command = Some(command.clone());
            match executor.execute(command) {
                Ok(CommandResult::Quit) => return Ok(()),
                Ok(result) => print_result(&executor, result),
                Err(e) => println!("{e}"),
            }
        }

        print!("> ");
        stdout.flush()?;
    }

    Ok(())
}

fn print_result(executor: &Executor, result: CommandResult) {
    match result {
        CommandResult::Ok | CommandResult::Quit => println!("OK"),
        CommandResult::Ran { hit_breakpoint } => {
            if hit_breakpoint {
                println!("Hit breakpoint at {:03X}", executor.chip8().pc());
            } else {
                println!("PC: {:03X}", executor.chip8().pc());
            }
        }
        CommandResult::Stepped { retired } => {
            println!("Retired {retired}, PC: {:03X}", executor.chip8().pc());
        }
        CommandResult::Breakpoints(breakpoints) => {
            let list: Vec<String> = breakpoints.iter().map(|b| format!("{b:03X}")).collect();
            println!("Breakpoints: [{}]", list.join(", "));
        }
        CommandResult::MemDump { data, offset } => {
            let mut output = String::new();
            for (i, byte) in data.iter().enumerate() {
                if i % 16 == 0 {
                    if i > 0 {
                        output.push('\n');
                    }
                    output.push_str(&format!("{:03X}: ", offset as usize + i));
                }
                output.push_str(&format!("{:02X} ", byte));
            }
            println!("{output}");
        }
        CommandResult::ShowRegisters => print!("{}", render_registers(executor.chip8())),
        CommandResult::ShowScreen => println!("{}", render_display(executor.get_display())),
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    match &cli.command {
        Mode::Run {
            machine,
            cycles,
            seconds,
        } => run(machine, *cycles, *seconds),
        Mode::Debug { machine } => debug(machine),
    }
}
