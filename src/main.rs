use std::process::ExitCode;

use clap::Parser;
use nyx::ast_printer::AstPrinter;
use nyx::cli::CliConfig;
use nyx::diagnostics::Diagnostics;
use nyx::disassembler::disassemble_module;
use nyx::module;
use nyx::natives::NativeRegistry;
use nyx::strings::StringCache;
use nyx::vm::VirtualMachine;

fn main() -> ExitCode {
    let cli = CliConfig::parse();

    let mut builder = env_logger::Builder::from_default_env();
    builder.format_timestamp(None);
    if cli.no_colorize_output {
        builder.write_style(env_logger::WriteStyle::Never);
    }
    builder.init();

    let mut diagnostics = Diagnostics::new();
    let natives = NativeRegistry::new();
    let mut strings = StringCache::new();

    let program = match module::compile_program(&cli.main, &natives, &mut strings, &mut diagnostics) {
        Ok(program) => program,
        Err(err) => {
            log::error!("{}", err);
            return ExitCode::FAILURE;
        }
    };

    if diagnostics.had_error() {
        return ExitCode::FAILURE;
    }

    if cli.dump_ast {
        for module in &program.resolved {
            print!("{}", AstPrinter::new(&module.ast, &cli).print_module(&module.name, &module.top_level));
        }
    }

    if cli.disassemble_code {
        for module in &program.modules {
            println!("{}", disassemble_module(module));
        }
    }

    if cli.check {
        return ExitCode::SUCCESS;
    }

    let mut vm = VirtualMachine::new(program.modules, strings, cli.trace_set());
    match vm.run(program.main_index) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{}", err);
            ExitCode::FAILURE
        }
    }
}
