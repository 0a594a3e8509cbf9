fn main() -> Result<(), Box<dyn std::error::Error>> {
    expert_mode::cli::main()
}
