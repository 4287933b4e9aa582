mod process_test;
