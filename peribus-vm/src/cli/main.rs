use clap::{Arg, ArgAction, ArgMatches, Command, value_parser, ValueEnum};
use simplelog::{ConfigBuilder, LevelFilter, LevelPadding, WriteLogger};
use std::fs::{self, File};
use std::path::PathBuf;
use time::macros::format_description;

use peribus_utils::hexprint::pretty_print_hex_block;
use peribus_vm::card::{issue_boot_read, Memory, ProDosStatus, BOOT_ADDRESS};
use peribus_vm::nib::{Diskette16Sector, NibImage, NIB_BYTES_PER_TRACK, NIB_TRACKS};
use peribus_vm::storage::{BlockStore, FileBlockStore, BLOCK_SIZE};
use peribus_vm::{build_hard_disk_rom, Card, CardDiskII, CardHardDisk, DriveSelect,
                 IoOffset, MMU, Slot};

const CMD_ROM: &str = "rom";
const CMD_BOOT: &str = "boot";
const CMD_NIB: &str = "nib";

const IMAGE_PATH: &str = "IMAGE_PATH";
const ROM_PATH: &str = "ROM_PATH";
const SLOT: &str = "slot";
const TRACK: &str = "track";
const READ_ONLY: &str = "read-only";
const TRACE: &str = "trace";
const LOG_PATH: &str = "LOG_PATH";
const LOG_LEVEL: &str = "LOG_LEVEL";

/// Possible log levels.
#[derive(Debug, PartialEq, Eq, Copy, Clone, ValueEnum)]
enum LogLevel {
    TRACE,
    DEBUG,
    INFO,
}

// Disk II softswitches used to drive the head.
const SS_PHASE_OFF: u8 = 0x0;
const SS_PHASE_ON: u8 = 0x1;
const SS_MOTOR_ON: u8 = 0x9;
const SS_DRIVE_1: u8 = 0xA;
const SS_Q6L: u8 = 0xC;
const SS_Q7L: u8 = 0xE;

fn slot_arg(default: &'static str) -> Arg {
    Arg::new(SLOT)
        .help("The expansion slot to put the card in.")
        .short('s')
        .long("slot")
        .action(ArgAction::Set)
        .default_value(default)
        .value_parser(value_parser!(u8).range(1..=7))
}

fn read_only_arg() -> Arg {
    Arg::new(READ_ONLY)
        .help("Mount the image read only.")
        .short('r')
        .long("read-only")
        .action(ArgAction::SetTrue)
}

fn cli() -> Command {
    // Hack to make the build dirty when the toml changes.
    include_str!("../../Cargo.toml");

    clap::command!()
        .max_term_width(100)
        .subcommand_required(true)
        .after_help("\
This is the peribus card workbench. It puts a single card in a slot of an \
otherwise empty machine and drives it through the bus the same way guest code \
would, printing what the guest would see.")
        .arg(Arg::new(LOG_PATH)
            .help("If set, a debug log will be written to the given path.")
            .short('l')
            .long("log")
            .action(ArgAction::Set)
            .global(true))
        .arg(Arg::new(LOG_LEVEL)
            .help("Set the log level. Has no effect without \
                   specifying --log as well. Case insensitive.")
            .short('L')
            .long("log-level")
            .action(ArgAction::Set)
            .default_value("TRACE")
            .value_parser(value_parser!(LogLevel))
            .ignore_case(true)
            .global(true))
        .subcommand(Command::new(CMD_ROM)
            .about("Print the hard disk card ROM generated for a slot.")
            .arg(slot_arg("7")))
        .subcommand(Command::new(CMD_BOOT)
            .about("Mount a ProDOS hard disk image, run the boot read and \
                    print the loaded boot block.")
            .arg(Arg::new(IMAGE_PATH)
                .help("The disk image: a raw ProDOS order image or a 2MG file.")
                .action(ArgAction::Set)
                .required(true)
                .value_parser(value_parser!(PathBuf)))
            .arg(slot_arg("7"))
            .arg(read_only_arg())
            .arg(Arg::new(TRACE)
                .help("Log every disk command at INFO level.")
                .short('t')
                .long("trace")
                .action(ArgAction::SetTrue)))
        .subcommand(Command::new(CMD_NIB)
            .about("Insert a floppy image in a Disk II card, seek to a track \
                    and print the nibbles read back from it.")
            .arg(Arg::new(IMAGE_PATH)
                .help("The floppy image: .nib, .dsk, .do or .po.")
                .action(ArgAction::Set)
                .required(true)
                .value_parser(value_parser!(PathBuf)))
            .arg(Arg::new(ROM_PATH)
                .help("The controller ROM to install (must be exactly 256 bytes).")
                .long("rom")
                .action(ArgAction::Set)
                .value_parser(value_parser!(PathBuf)))
            .arg(Arg::new(TRACK)
                .help("The track to read.")
                .short('t')
                .long("track")
                .action(ArgAction::Set)
                .default_value("0")
                .value_parser(value_parser!(u8).range(0..NIB_TRACKS as i64)))
            .arg(slot_arg("6"))
            .arg(read_only_arg()))
}

/// Initialise logging to the given file.
fn init_logging(logfile: File, level: LevelFilter) -> Result<(), String> {
    let config = ConfigBuilder::new()
        .set_level_padding(LevelPadding::Right)
        .set_location_level(LevelFilter::Off)
        .set_target_level(LevelFilter::Off)
        .set_thread_level(LevelFilter::Off)
        .set_time_format_custom(format_description!(
            "[hour]:[minute]:[second].[subsecond digits:6]"))
        .build();

    WriteLogger::init(level, config, logfile)
        .map_err(|e| format!("Failed to initialise logging: {}", e))
}

fn get_slot(args: &ArgMatches) -> Result<Slot, String> {
    let number = *args.get_one::<u8>(SLOT).unwrap();
    Slot::new(number).map_err(|e| e.to_string())
}

/// Print the ROM a hard disk card would install in the slot.
fn print_rom(args: &ArgMatches) -> Result<(), String> {
    let slot = get_slot(args)?;
    let rom = build_hard_disk_rom(slot);
    println!("{}", pretty_print_hex_block(&rom, slot.rom_base()));
    Ok(())
}

/// Do what the guest's boot scan would: find the card signature, then let
/// the card ROM's boot code load block 0.
fn boot(args: &ArgMatches) -> Result<(), String> {
    let path = args.get_one::<PathBuf>(IMAGE_PATH).unwrap();
    let slot = get_slot(args)?;
    let store = FileBlockStore::open(path, args.get_flag(READ_ONLY))
        .map_err(|e| format!("Failed to open '{}': {}", path.display(), e))?;
    let header = store.header();
    println!("Mounted '{}': {} blocks{}.", path.display(), header.blocks,
             if header.read_only { ", read only" } else { "" });

    let mut card = CardHardDisk::with_disk(Box::new(store));
    card.set_trace(args.get_flag(TRACE));
    card.load_rom(build_hard_disk_rom(slot)).map_err(|e| e.to_string())?;
    let mut mmu = MMU::new();
    mmu.insert_card(slot, Box::new(card)).map_err(|e| e.to_string())?;

    let base = slot.rom_base();
    let signature: Vec<u8> = [1, 3, 5, 7].iter().map(|&i| mmu.peek(base + i)).collect();
    if signature != [0x20, 0x00, 0x03, 0x3C] {
        return Err(format!("No boot signature in slot {}.", slot));
    }

    let status = issue_boot_read(&mut mmu, slot);
    if status != ProDosStatus::NoError.code() {
        return Err(format!("Boot read failed with status ${:02X}.", status));
    }

    let block: Vec<u8> = (0..BLOCK_SIZE as u16).map(|i| mmu.peek(BOOT_ADDRESS + i)).collect();
    println!("{}", pretty_print_hex_block(&block, BOOT_ADDRESS));
    Ok(())
}

/// Walk the head of the selected drive from track 0 out to `track`, one
/// half track at a time.
fn seek(mmu: &mut MMU, slot: Slot, track: u8) {
    let switch = |n: u8| slot.io_address(IoOffset::at(n));
    let mut phase = 0;
    mmu.poke(switch(SS_PHASE_ON), 0);
    for _ in 0..track as u16 * 2 {
        let next = (phase + 1) % 4;
        mmu.poke(switch(SS_PHASE_ON + next * 2), 0);
        mmu.poke(switch(SS_PHASE_OFF + phase * 2), 0);
        phase = next;
    }
    mmu.poke(switch(SS_PHASE_OFF + phase * 2), 0);
}

fn dump_track(args: &ArgMatches) -> Result<(), String> {
    let path = args.get_one::<PathBuf>(IMAGE_PATH).unwrap();
    let slot = get_slot(args)?;
    let track = *args.get_one::<u8>(TRACK).unwrap();

    let image = NibImage::open(path)
        .map_err(|e| format!("Failed to open '{}': {}", path.display(), e))?;
    let mut diskette = Diskette16Sector::new(image);
    diskette.set_write_protected(args.get_flag(READ_ONLY));

    let mut card = CardDiskII::new();
    if let Some(rom_path) = args.get_one::<PathBuf>(ROM_PATH) {
        let rom = fs::read(rom_path)
            .map_err(|e| format!("Failed to open ROM file: {}", e))?;
        card.load_rom(rom).map_err(|e| e.to_string())?;
    }
    card.insert_diskette(DriveSelect::Drive1, Box::new(diskette));
    let mut mmu = MMU::new();
    mmu.insert_card(slot, Box::new(card)).map_err(|e| e.to_string())?;

    let switch = |n: u8| slot.io_address(IoOffset::at(n));
    mmu.poke(switch(SS_DRIVE_1), 0);
    seek(&mut mmu, slot, track);
    mmu.poke(switch(SS_Q7L), 0);
    mmu.poke(switch(SS_Q6L), 0);
    mmu.poke(switch(SS_MOTOR_ON), 0);

    let nibbles: Vec<u8> = (0..NIB_BYTES_PER_TRACK).map(|_| mmu.peek(switch(SS_Q6L))).collect();
    println!("Track {}:", track);
    println!("{}", pretty_print_hex_block(&nibbles, 0));
    Ok(())
}

/// Main run function; returns an exit code.
fn run(args: ArgMatches) -> u8 {
    return match _run(args) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    };

    fn _run(args: ArgMatches) -> Result<(), String> {
        // Initialise logging if configured.
        if let Some(log_path) = args.get_one::<String>(LOG_PATH) {
            match File::create(log_path) {
                Ok(logfile) => {
                    let level = match args.get_one::<LogLevel>(LOG_LEVEL).unwrap() {
                        LogLevel::TRACE => LevelFilter::Trace,
                        LogLevel::DEBUG => LevelFilter::Debug,
                        LogLevel::INFO => LevelFilter::Info,
                    };
                    init_logging(logfile, level)?;
                },
                Err(e) => return Err(
                    format!("Failed to create log file: {}", e)),
            }
        }

        match args.subcommand() {
            Some((CMD_ROM, sub_args)) => print_rom(sub_args),
            Some((CMD_BOOT, sub_args)) => boot(sub_args),
            Some((CMD_NIB, sub_args)) => dump_track(sub_args),
            _ => unreachable!(),
        }
    }
}

fn main() {
    let args = cli().get_matches();
    std::process::exit(run(args).into());
}
