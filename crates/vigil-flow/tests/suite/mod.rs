mod budgets;
mod literal_guards;
mod out_args_and_closures;
