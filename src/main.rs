fn main() -> anyhow::Result<()> {
    daily_flag_lib::run()
}
